mod audio;

use clap::Parser;
use dotmatrix_core::{cartridge, diagnostics, gameboy, input::Button, ppu};
use log::{info, warn};
use pixels::{Pixels, SurfaceTexture};
use std::time::Duration;
use winit::{
    event::{ElementState, Event, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

const SCALE: u32 = 3;

#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: Option<std::path::PathBuf>,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<std::path::PathBuf>,

    /// Enable periodic logging of CPU state
    #[arg(long)]
    debug: bool,

    /// Run without opening a window
    #[arg(long)]
    headless: bool,

    /// Disable audio output (emulation runs unpaced)
    #[arg(long)]
    mute: bool,

    /// Number of frames to run in headless mode
    #[arg(long)]
    frames: Option<usize>,

    /// Number of seconds to run in headless mode
    #[arg(long)]
    seconds: Option<u64>,

    /// Number of CPU cycles to run in headless mode
    #[arg(long)]
    cycles: Option<u64>,
}

/// Forwards core diagnostics into the `log` ecosystem.
struct LogBridge;

impl diagnostics::LogSink for LogBridge {
    fn log(&self, level: diagnostics::Level, target: &'static str, args: std::fmt::Arguments) {
        match level {
            diagnostics::Level::Info => info!("[{target}] {args}"),
            diagnostics::Level::Warn => warn!("[{target}] {args}"),
        }
    }
}

fn key_to_button(key: VirtualKeyCode) -> Option<Button> {
    match key {
        VirtualKeyCode::Right => Some(Button::Right),
        VirtualKeyCode::Left => Some(Button::Left),
        VirtualKeyCode::Up => Some(Button::Up),
        VirtualKeyCode::Down => Some(Button::Down),
        VirtualKeyCode::X => Some(Button::A),
        VirtualKeyCode::Z => Some(Button::B),
        VirtualKeyCode::LShift | VirtualKeyCode::RShift => Some(Button::Select),
        VirtualKeyCode::Return => Some(Button::Start),
        _ => None,
    }
}

fn main() {
    env_logger::init();
    let _ = diagnostics::try_set_log_sink(Box::new(LogBridge));
    let args = Args::parse();

    let rom_path = match args.rom {
        Some(p) => p,
        None => {
            eprintln!("No ROM supplied");
            return;
        }
    };

    let cart = match cartridge::Cartridge::from_file(&rom_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return;
        }
    };

    let mut gb = if args.bootrom.is_some() {
        gameboy::GameBoy::new_power_on()
    } else {
        gameboy::GameBoy::new()
    };
    gb.mmu.load_cart(cart);

    if let Some(path) = args.bootrom {
        match std::fs::read(&path) {
            Ok(data) => gb.mmu.load_boot_rom(data),
            Err(e) => eprintln!("Failed to load boot ROM: {e}"),
        }
    }

    let _stream = if args.headless || args.mute {
        None
    } else {
        match audio::start_stream() {
            Ok((stream, sink)) => {
                gb.mmu.apu.set_sink(Box::new(sink));
                Some(stream)
            }
            Err(e) => {
                warn!("audio disabled: {e}");
                None
            }
        }
    };

    let mut frame = vec![0u8; ppu::FRAMEBUFFER_LEN];
    let mut frame_count = 0u64;

    if !args.headless {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title("dotmatrix")
            .with_inner_size(winit::dpi::LogicalSize::new(
                (ppu::SCREEN_WIDTH as u32 * SCALE) as f64,
                (ppu::SCREEN_HEIGHT as u32 * SCALE) as f64,
            ))
            .build(&event_loop)
            .expect("Failed to create window");

        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, &window);
        let mut pixels = Pixels::new(
            ppu::SCREEN_WIDTH as u32,
            ppu::SCREEN_HEIGHT as u32,
            surface,
        )
        .expect("Pixels error");

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        gb.mmu.save_cart_ram();
                        *control_flow = ControlFlow::Exit;
                    }
                    WindowEvent::Resized(size) => {
                        let _ = pixels.resize_surface(size.width, size.height);
                    }
                    WindowEvent::KeyboardInput { input, .. } => {
                        if let Some(key) = input.virtual_keycode {
                            let pressed = input.state == ElementState::Pressed;
                            if key == VirtualKeyCode::Escape {
                                if pressed {
                                    gb.mmu.save_cart_ram();
                                    *control_flow = ControlFlow::Exit;
                                }
                            } else if let Some(button) = key_to_button(key) {
                                if pressed {
                                    gb.mmu.input.key_down(button, &mut gb.mmu.if_reg);
                                } else {
                                    gb.mmu.input.key_up(button);
                                }
                            }
                        }
                    }
                    _ => {}
                },
                Event::MainEventsCleared => {
                    while !gb.mmu.ppu.frame_ready() {
                        gb.step();
                    }

                    frame.copy_from_slice(gb.mmu.ppu.framebuffer());
                    gb.mmu.ppu.clear_frame_flag();
                    window.request_redraw();

                    if args.debug && frame_count % 60 == 0 {
                        println!("{}", gb.cpu.debug_state());
                    }

                    frame_count += 1;
                }
                Event::RedrawRequested(_) => {
                    pixels.frame_mut().copy_from_slice(&frame);
                    if pixels.render().is_err() {
                        *control_flow = ControlFlow::Exit;
                    }
                }
                _ => {}
            }
        });
    } else {
        let frame_limit = args.frames;
        let cycle_limit = args.cycles;
        let second_limit = args.seconds.map(Duration::from_secs);

        let start = std::time::Instant::now();
        'headless: loop {
            while !gb.mmu.ppu.frame_ready() {
                gb.step();
                if let Some(max) = cycle_limit {
                    if gb.cpu.cycles >= max {
                        break 'headless;
                    }
                }
                if let Some(limit) = second_limit {
                    if start.elapsed() >= limit {
                        break 'headless;
                    }
                }
            }

            frame.copy_from_slice(gb.mmu.ppu.framebuffer());
            gb.mmu.ppu.clear_frame_flag();

            if args.debug && frame_count % 60 == 0 {
                println!("{}", gb.cpu.debug_state());
            }

            frame_count += 1;

            if let Some(max) = frame_limit {
                if frame_count >= max as u64 {
                    break;
                }
            }
            if let Some(limit) = second_limit {
                if start.elapsed() >= limit {
                    break;
                }
            }
        }

        gb.mmu.save_cart_ram();
    }
}
