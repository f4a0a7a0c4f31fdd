mod pixel_buffer;

pub use pixel_buffer::{Channel, Color, MaskWriter, PixelBuffer, PixelFormat, Plot};

#[cfg(feature = "window")]
pub use window::{Display, InputEvent, RenderTarget, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// SDL2 presentation of a 4-byte [`PixelBuffer`]
#[cfg(feature = "window")]
mod window {
    use sdl2::event::Event;
    use sdl2::pixels::PixelFormatEnum;
    use sdl2::render::{Canvas, Texture, TextureCreator};
    use sdl2::video::{Window, WindowContext};
    use sdl2::EventPump;

    use super::PixelBuffer;

    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;

    pub struct Display {
        canvas: Canvas<Window>,
        event_pump: EventPump,
    }

    pub struct RenderTarget<'a> {
        texture: Texture<'a>,
    }

    /// Input the screensaver reacts to; all of them end the animation
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum InputEvent {
        Quit,
        KeyDown,
        MouseDown,
    }

    impl Display {
        /// Create a centered window.
        /// vsync=true locks to monitor refresh, vsync=false runs uncapped
        pub fn with_options(
            title: &str,
            width: u32,
            height: u32,
            vsync: bool,
        ) -> Result<(Self, TextureCreator<WindowContext>), String> {
            let sdl_context = sdl2::init()?;
            let video_subsystem = sdl_context.video()?;

            let window = video_subsystem
                .window(title, width, height)
                .position_centered()
                .build()
                .map_err(|e| e.to_string())?;

            let mut canvas_builder = window.into_canvas().accelerated();
            if vsync {
                canvas_builder = canvas_builder.present_vsync();
            }
            let canvas = canvas_builder.build().map_err(|e| e.to_string())?;

            let texture_creator = canvas.texture_creator();
            let event_pump = sdl_context.event_pump()?;

            Ok((
                Self { canvas, event_pump },
                texture_creator,
            ))
        }

        /// Upload `buffer` and flip. The buffer's B,G,R,A byte order is
        /// SDL's little-endian ARGB8888.
        pub fn present(
            &mut self,
            target: &mut RenderTarget,
            buffer: &PixelBuffer,
        ) -> Result<(), String> {
            target
                .texture
                .update(None, buffer.as_bytes(), buffer.stride())
                .map_err(|e| e.to_string())?;

            self.canvas.copy(&target.texture, None, None)?;
            self.canvas.present();
            Ok(())
        }

        pub fn poll_events(&mut self) -> Vec<InputEvent> {
            self.event_pump
                .poll_iter()
                .filter_map(|event| match event {
                    Event::Quit { .. } => Some(InputEvent::Quit),
                    Event::KeyDown { .. } => Some(InputEvent::KeyDown),
                    Event::MouseButtonDown { .. } => Some(InputEvent::MouseDown),
                    _ => None,
                })
                .collect()
        }
    }

    impl<'a> RenderTarget<'a> {
        pub fn with_size(
            texture_creator: &'a TextureCreator<WindowContext>,
            width: u32,
            height: u32,
        ) -> Result<Self, String> {
            let texture = texture_creator
                .create_texture_streaming(PixelFormatEnum::ARGB8888, width, height)
                .map_err(|e| e.to_string())?;
            Ok(Self { texture })
        }
    }
}
