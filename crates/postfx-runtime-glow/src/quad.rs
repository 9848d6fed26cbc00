use glow::HasContext;
use postfx_core::ChainError;

/// `vec4` position at location 0, `vec2` tex coord at location 1.
const STRIDE: i32 = 6 * 4;

/// Offscreen passes cover clip space directly.
#[rustfmt::skip]
const OFFSCREEN: [f32; 24] = [
    -1.0, -1.0, 0.0, 1.0,   0.0, 0.0,
     1.0, -1.0, 0.0, 1.0,   1.0, 0.0,
    -1.0,  1.0, 0.0, 1.0,   0.0, 1.0,
     1.0,  1.0, 0.0, 1.0,   1.0, 1.0,
];

/// The final pass draws the unit square through the caller's MVP.
#[rustfmt::skip]
const UNIT: [f32; 24] = [
    0.0, 0.0, 0.0, 1.0,   0.0, 0.0,
    1.0, 0.0, 0.0, 1.0,   1.0, 0.0,
    0.0, 1.0, 0.0, 1.0,   0.0, 1.0,
    1.0, 1.0, 0.0, 1.0,   1.0, 1.0,
];

#[derive(Debug)]
struct QuadBuffer {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl QuadBuffer {
    unsafe fn new(gl: &glow::Context, verts: &[f32; 24]) -> Result<Self, ChainError> {
        let vao = gl
            .create_vertex_array()
            .map_err(|e| ChainError::resource(format!("create_vertex_array: {e}")))?;
        let vbo = match gl.create_buffer() {
            Ok(vbo) => vbo,
            Err(e) => {
                gl.delete_vertex_array(vao);
                return Err(ChainError::resource(format!("create_buffer: {e}")));
            }
        };

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(verts),
            glow::STATIC_DRAW,
        );

        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 4, glow::FLOAT, false, STRIDE, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, STRIDE, 4 * 4);

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);
        Ok(Self { vao, vbo })
    }

    unsafe fn draw(&self, gl: &glow::Context) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
        gl.bind_vertex_array(None);
    }

    unsafe fn destroy(&self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

/// Both full-screen quads used by passes.
#[derive(Debug)]
pub struct Quads {
    offscreen: QuadBuffer,
    unit: QuadBuffer,
}

impl Quads {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, ChainError> {
        let offscreen = QuadBuffer::new(gl, &OFFSCREEN)?;
        match QuadBuffer::new(gl, &UNIT) {
            Ok(unit) => Ok(Self { offscreen, unit }),
            Err(e) => {
                offscreen.destroy(gl);
                Err(e)
            }
        }
    }

    pub unsafe fn draw_offscreen(&self, gl: &glow::Context) {
        self.offscreen.draw(gl);
    }

    pub unsafe fn draw_unit(&self, gl: &glow::Context) {
        self.unit.draw(gl);
    }

    pub unsafe fn destroy(&self, gl: &glow::Context) {
        self.offscreen.destroy(gl);
        self.unit.destroy(gl);
    }
}
