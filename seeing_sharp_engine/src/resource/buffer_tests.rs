/// Tests for BufferResource

use super::*;
use std::sync::Arc;
use crate::error::Error;
use crate::graphics_device::MockGraphicsDevice;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Transform {
    scale: f32,
    offset: [f32; 3],
}

fn setup() -> (Arc<MockGraphicsDevice>, ResourceDictionary) {
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let dictionary = ResourceDictionary::new(device.clone());
    (device, dictionary)
}

#[test]
fn test_vertex_buffer_uploads_contents_on_load() {
    let (device, dict) = setup();
    let buffer = BufferResource::vertices("quad", &[[0.0f32, 0.0], [1.0, 0.0], [1.0, 1.0]]);

    assert_eq!(buffer.element_count(), 3);
    buffer.load_resource(device.as_ref(), &dict).unwrap();

    let writes = device.buffer_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1.len(), 24);
    assert_eq!(buffer.handle().map(|h| h.kind), Some(NativeResourceKind::VertexBuffer));
}

#[test]
fn test_index_buffer_element_count() {
    let buffer = BufferResource::indices("idx", &[0, 1, 2, 2, 3, 0]);
    assert_eq!(buffer.kind(), BufferKind::Index);
    assert_eq!(buffer.element_count(), 6);
    assert_eq!(buffer.size_bytes(), 24);
}

#[test]
fn test_constant_update_while_loaded_uploads_immediately() {
    let (device, dict) = setup();
    let buffer = BufferResource::constants("cb", &Transform { scale: 1.0, offset: [0.0; 3] });
    buffer.load_resource(device.as_ref(), &dict).unwrap();

    let updated = Transform { scale: 2.0, offset: [1.0, 2.0, 3.0] };
    buffer.update_constants(device.as_ref(), &updated).unwrap();

    let writes = device.buffer_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].1, bytemuck::bytes_of(&updated).to_vec());
}

#[test]
fn test_constant_update_while_unloaded_is_applied_on_next_load() {
    let (device, dict) = setup();
    let buffer = BufferResource::constants("cb", &Transform { scale: 1.0, offset: [0.0; 3] });
    let updated = Transform { scale: 5.0, offset: [0.0; 3] };

    buffer.update_constants(device.as_ref(), &updated).unwrap();
    assert!(device.buffer_writes().is_empty());

    buffer.load_resource(device.as_ref(), &dict).unwrap();
    assert_eq!(device.buffer_writes()[0].1, bytemuck::bytes_of(&updated).to_vec());
}

#[test]
fn test_constant_update_rejects_wrong_size_or_kind() {
    let (device, _dict) = setup();
    let constants = BufferResource::constants("cb", &Transform { scale: 1.0, offset: [0.0; 3] });
    let vertices = BufferResource::vertices("vb", &[1.0f32, 2.0]);

    assert!(matches!(constants.update_constants(device.as_ref(), &1.0f32), Err(Error::InvalidResource(_))));
    assert!(matches!(vertices.update_constants(device.as_ref(), &[1.0f32, 2.0]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_failed_upload_is_cleaned_by_dictionary() {
    let (device, dict) = setup();
    device.fail_creation_of(NativeResourceKind::IndexBuffer);

    let result: Result<Arc<BufferResource>> =
        dict.get_resource_and_ensure_loaded("idx", || Ok(BufferResource::indices("idx", &[0, 1, 2])));

    assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
    assert_eq!(device.live_handle_count(), 0);
}
