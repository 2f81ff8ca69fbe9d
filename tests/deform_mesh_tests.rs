//! End-to-end tests for the mutator/consumer section protocol.
//!
//! Everything runs on the headless backend, which records uploads and
//! allows byte-level readback of the GPU-visible transform array.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rstest::rstest;

use deform_mesh::{
    DeformMeshComponent, DeformMeshConfig, GpuDeformTransform, HeadlessBackend, MaterialHandle,
    MeshGeometry,
};

const DEFAULT_MATERIAL: MaterialHandle = MaterialHandle(1);

fn setup() -> (
    DeformMeshComponent,
    deform_mesh::DeformMeshRenderProxy,
    Arc<HeadlessBackend>,
) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mesh = DeformMeshComponent::new(DeformMeshConfig::default());
    let backend = Arc::new(HeadlessBackend::new());
    let proxy = mesh.create_render_proxy(backend.clone(), DEFAULT_MATERIAL);
    (mesh, proxy, backend)
}

fn cube() -> Arc<MeshGeometry> {
    Arc::new(MeshGeometry::unit_cube())
}

/// Reads the GPU-visible transform array back as matrices in the mutator
/// convention.
fn readback_transforms(
    proxy: &deform_mesh::DeformMeshRenderProxy,
    backend: &HeadlessBackend,
) -> Vec<Mat4> {
    let handle = proxy.transform_buffer().buffer().expect("buffer allocated");
    let bytes = backend.buffer_contents(handle).expect("buffer exists");
    let entries: &[GpuDeformTransform] = bytemuck::cast_slice(&bytes);
    entries.iter().map(|e| e.to_matrix()).collect()
}

#[test]
fn unit_cube_end_to_end() {
    let (mut mesh, mut proxy, backend) = setup();

    // Create section 0 with a unit cube and the identity transform.
    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    assert_eq!(mesh.num_sections(), 1);
    let bounds = mesh.local_bounds();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::ONE);

    // Translate by (5, 0, 0): accumulated bounds cover both boxes.
    let translation = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
    mesh.update_mesh_section_transform(0, translation);
    let bounds = mesh.local_bounds();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::new(6.0, 1.0, 1.0));

    mesh.finish_transforms_update();
    proxy.process_commands().unwrap();

    // GPU copy holds the translation, in the transposed row convention.
    let transforms = readback_transforms(&proxy, &backend);
    assert_eq!(transforms.len(), 1);
    assert_eq!(transforms[0], translation);
    assert!(!proxy.transform_buffer().is_dirty());
}

#[test]
fn sparse_sections_render_in_index_order() {
    let (mut mesh, mut proxy, _backend) = setup();

    // Create sections 0 and 2, skipping 1.
    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    mesh.create_mesh_section(2, cube(), Mat4::IDENTITY);
    assert_eq!(mesh.num_sections(), 3);

    proxy.process_commands().unwrap();

    let indices: Vec<usize> = proxy.draw_calls().map(|c| c.section_index).collect();
    assert_eq!(indices, vec![0, 2]);
    // The hole still owns its transform slot.
    assert_eq!(proxy.transform_buffer().len(), 3);
    assert_eq!(
        proxy.draw_calls().map(|c| c.transform_slot).collect::<Vec<_>>(),
        vec![0, 2]
    );
}

#[test]
fn hidden_section_keeps_its_slot() {
    let (mut mesh, mut proxy, _backend) = setup();

    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    mesh.create_mesh_section(1, cube(), Mat4::IDENTITY);
    mesh.set_mesh_section_visible(0, false);
    mesh.finish_transforms_update();

    proxy.process_commands().unwrap();

    let calls: Vec<_> = proxy.draw_calls().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].section_index, 1);
    assert_eq!(calls[0].transform_slot, 1);
    // Section 0 is still mirrored at index 0, just not drawn.
    assert!(proxy.sections().get(0).is_some());
}

#[rstest]
#[case::two(2)]
#[case::eight(8)]
#[case::sixty_four(64)]
fn batched_updates_cost_one_upload(#[case] section_count: usize) {
    let (mut mesh, mut proxy, backend) = setup();

    for index in 0..section_count {
        mesh.create_mesh_section(index, cube(), Mat4::IDENTITY);
    }
    proxy.process_commands().unwrap();
    let baseline = backend.write_count();

    // Move every section, commit once.
    for index in 0..section_count {
        mesh.update_mesh_section_transform(
            index,
            Mat4::from_translation(Vec3::new(index as f32, 0.0, 0.0)),
        );
    }
    mesh.finish_transforms_update();
    proxy.process_commands().unwrap();

    assert_eq!(backend.write_count(), baseline + 1);

    // Every staged value landed, stage order notwithstanding.
    let transforms = readback_transforms(&proxy, &backend);
    for (index, transform) in transforms.iter().enumerate() {
        assert_eq!(
            *transform,
            Mat4::from_translation(Vec3::new(index as f32, 0.0, 0.0))
        );
    }
}

#[test]
fn commit_without_changes_uploads_nothing() {
    let (mut mesh, mut proxy, backend) = setup();

    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();
    let baseline = backend.write_count();

    mesh.finish_transforms_update();
    assert!(!proxy.process_commands().unwrap());
    assert_eq!(backend.write_count(), baseline);
}

#[test]
fn structural_change_rebuilds_and_resizes() {
    let (mut mesh, mut proxy, backend) = setup();

    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();
    assert_eq!(proxy.transform_buffer().len(), 1);

    // Growing the section list reallocates the packed array and carries
    // the existing transform forward.
    let moved = Mat4::from_translation(Vec3::Y);
    mesh.update_mesh_section_transform(0, moved);
    mesh.finish_transforms_update();
    mesh.create_mesh_section(3, cube(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();

    assert_eq!(proxy.transform_buffer().len(), 4);
    let transforms = readback_transforms(&proxy, &backend);
    assert_eq!(transforms[0], moved);
    assert_eq!(transforms[3], Mat4::IDENTITY);

    mesh.clear_all_mesh_sections();
    proxy.process_commands().unwrap();
    assert_eq!(mesh.num_sections(), 0);
    assert!(proxy.sections().is_empty());
    assert!(proxy.draw_calls().next().is_none());
}

#[test]
fn cleared_slot_becomes_a_hole() {
    let (mut mesh, mut proxy, _backend) = setup();

    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    mesh.create_mesh_section(1, cube(), Mat4::IDENTITY);
    mesh.clear_mesh_section(0);
    proxy.process_commands().unwrap();

    // The slot stays allocated; only section 1 draws.
    assert_eq!(proxy.sections().len(), 2);
    assert_eq!(proxy.transform_buffer().len(), 2);
    let indices: Vec<usize> = proxy.draw_calls().map(|c| c.section_index).collect();
    assert_eq!(indices, vec![1]);
}

#[test]
fn updates_from_a_worker_thread_reach_the_consumer() {
    let (mut mesh, mut proxy, backend) = setup();

    mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();

    // Drive the mutator from another thread, as a simulation tick would.
    let moved = Mat4::from_translation(Vec3::new(0.0, 0.0, 9.0));
    let handle = std::thread::spawn(move || {
        mesh.update_mesh_section_transform(0, moved);
        mesh.finish_transforms_update();
        mesh
    });
    let _mesh = handle.join().unwrap();

    assert!(proxy.process_commands().unwrap());
    let transforms = readback_transforms(&proxy, &backend);
    assert_eq!(transforms[0], moved);
}

#[test]
fn default_material_is_injected_not_global() {
    let (mut mesh, mut proxy, _backend) = setup();

    let with_material = Arc::new(MeshGeometry::unit_cube().with_material(MaterialHandle(42)));
    mesh.create_mesh_section(0, with_material, Mat4::IDENTITY);
    mesh.create_mesh_section(1, cube(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();

    let materials: Vec<MaterialHandle> = proxy.draw_calls().map(|c| c.material).collect();
    assert_eq!(materials, vec![MaterialHandle(42), DEFAULT_MATERIAL]);
}

#[test]
fn draw_call_geometry_binds_match_source() {
    let (mut mesh, mut proxy, _backend) = setup();
    let geometry = cube();
    mesh.create_mesh_section(0, geometry.clone(), Mat4::IDENTITY);
    proxy.process_commands().unwrap();

    let call = proxy.draw_calls().next().unwrap();
    assert_eq!(call.triangle_count, 12);
    assert_eq!(call.max_vertex_index, 23);
    assert_eq!(call.geometry.vertex_bytes(), geometry.vertex_bytes());
    assert_eq!(call.geometry.index_bytes(), geometry.index_bytes());
}
