use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use gametoy_gfx::GfxConfig;
use gametoy_gfx::coords::{Color, Vec2};
use gametoy_gfx::core::{App, AppControl, FrameCtx};
use gametoy_gfx::device::Backend;
use gametoy_gfx::draw::{
    Anchor, DrawSpriteOpt, DrawTextureOpt, Gfx, LoadSpriteOpt, RenderProps, Sprite, SpriteAnim,
};
use gametoy_gfx::logging::{init_logging, LoggingConfig};
use gametoy_gfx::resources::{Shader, Texture, TextureOpt, Uniforms};
use gametoy_gfx::window::{Runtime, RuntimeConfig};

const FRAME_SIZE: u32 = 32;
const FRAMES: u32 = 4;

const WAVE_FRAG: &str = r#"struct Uniforms {
    u_time: f32,
}

fn frag(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    let c = def_frag(pos, uv, color);
    let glow = 0.85 + 0.15 * sin(u.u_time * 2.0 + uv.x * 6.0);
    return vec4<f32>(c.rgb * glow, c.a);
}
"#;

/// Horizontal strip of `FRAMES` cells, each a disc at a different phase.
fn sprite_sheet() -> RgbaImage {
    let mut img = RgbaImage::new(FRAME_SIZE * FRAMES, FRAME_SIZE);
    let r = FRAME_SIZE as f32 / 2.0 - 2.0;

    for frame in 0..FRAMES {
        let squash = 1.0 - 0.25 * (frame as f32 / FRAMES as f32 * std::f32::consts::PI).sin();
        for y in 0..FRAME_SIZE {
            for x in 0..FRAME_SIZE {
                let dx = x as f32 + 0.5 - FRAME_SIZE as f32 / 2.0;
                let dy = (y as f32 + 0.5 - FRAME_SIZE as f32 / 2.0) / squash;
                if dx * dx + dy * dy <= r * r {
                    let shade = (255.0 * (0.6 + 0.4 * (1.0 - dy / r) / 2.0)) as u8;
                    img.put_pixel(frame * FRAME_SIZE + x, y, Rgba([shade, 120, 60, 255]));
                }
            }
        }
    }
    img
}

fn tile_image() -> RgbaImage {
    RgbaImage::from_fn(16, 16, |x, y| {
        if x == 0 || y == 0 {
            Rgba([40, 70, 40, 255])
        } else {
            Rgba([70, 110, 60, 255])
        }
    })
}

struct Demo {
    blob: Option<Sprite>,
    ground: Option<Texture>,
    wave: Option<Shader>,
}

impl Demo {
    fn anim_frame(&self, sprite: &Sprite, elapsed: f32) -> usize {
        match sprite.anim("wobble") {
            Some(&SpriteAnim::Range { from, to, speed, .. }) => {
                let span = to - from + 1;
                from + (elapsed * speed.unwrap_or(8.0)) as usize % span
            }
            Some(anim) => anim.first_frame(),
            None => 0,
        }
    }

    fn draw<B: Backend>(&self, gfx: &mut Gfx<B>, elapsed: f32) -> gametoy_gfx::Result<()> {
        let (Some(blob), Some(ground)) = (&self.blob, &self.ground) else {
            return Ok(());
        };

        let (w, h) = (gfx.width(), gfx.height());
        gfx.draw_texture(&DrawTextureOpt {
            width: Some(w),
            height: Some(64.0),
            tiled: true,
            props: RenderProps { pos: Vec2::new(0.0, h - 64.0), ..RenderProps::default() },
            ..DrawTextureOpt::new(ground)
        })?;

        let frame = self.anim_frame(blob, elapsed);
        let uniforms = Uniforms::new().with("u_time", elapsed);
        for i in 0..8 {
            let t = elapsed + i as f32 * 0.7;
            gfx.draw_sprite(&DrawSpriteOpt {
                frame,
                anchor: Anchor::Center,
                flip_x: i % 2 == 1,
                props: RenderProps {
                    pos: Vec2::new(w * (i as f32 + 0.5) / 8.0, h * 0.5 + 60.0 * t.sin()),
                    scale: Vec2::splat(2.0),
                    angle: (t * 45.0) % 360.0,
                    color: Color::from_rgb8(255, 230 - i as u8 * 20, 200),
                    shader: self.wave,
                    uniforms: Some(&uniforms),
                    ..RenderProps::default()
                },
                ..DrawSpriteOpt::new(blob)
            })?;
        }
        Ok(())
    }
}

impl App for Demo {
    fn on_start<B: Backend>(&mut self, gfx: &mut Gfx<B>) -> Result<()> {
        let mut opt = LoadSpriteOpt { slice_x: FRAMES, ..LoadSpriteOpt::default() };
        opt.anims.insert(
            "wobble".to_string(),
            SpriteAnim::Range { from: 0, to: FRAMES as usize - 1, looping: true, pingpong: false, speed: Some(8.0) },
        );
        self.blob = Some(gfx.load_sprite_image(&sprite_sheet(), &opt).context("loading sprite")?);

        let ground = Texture::from_image(gfx.ctx_mut(), tile_image(), TextureOpt::default())
            .context("creating ground texture")?;
        self.ground = Some(ground);

        self.wave = Some(gfx.create_shader(None, Some(WAVE_FRAG)).context("compiling shader")?);
        log::info!("demo assets ready");
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(KeyCode::Escape), state: ElementState::Pressed, .. },
                ..
            } => AppControl::Exit,
            _ => AppControl::Continue,
        }
    }

    fn on_frame<B: Backend>(&mut self, ctx: &mut FrameCtx<'_, B>) -> Result<AppControl> {
        let elapsed = ctx.elapsed();
        ctx.render(|gfx| self.draw(gfx, elapsed))?;
        if ctx.time.frame_index % 600 == 0 {
            log::debug!("frame {}: {} draw calls", ctx.time.frame_index, ctx.gfx.last_draw_calls());
        }
        Ok(AppControl::Continue)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "gametoy demo".to_string(),
        gfx: GfxConfig { width: Some(640), height: Some(360), ..GfxConfig::default() },
        ..RuntimeConfig::default()
    };

    Runtime::run(config, Demo { blob: None, ground: None, wave: None })
}
