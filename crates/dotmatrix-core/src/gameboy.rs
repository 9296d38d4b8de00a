use crate::{cpu::Cpu, mmu::Mmu, CLOCKSPEED};

/// Master cycles per 60 Hz host frame.
pub const CYCLES_PER_FRAME: u32 = CLOCKSPEED / 60;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// Create a machine initialized to the post-boot state, ready to execute
    /// a cartridge from 0x0100 without a boot ROM image.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
        }
    }

    /// Create a machine in its power-on state, intended to be paired with
    /// [`Mmu::load_boot_rom`].
    pub fn new_power_on() -> Self {
        Self {
            cpu: Cpu::new_power_on(),
            mmu: Mmu::new(),
        }
    }

    /// Execute one instruction and advance every other unit by its cost,
    /// then service interrupts. Returns the total master cycles consumed.
    ///
    /// The ordering matters: the PPU and timer may raise interrupt requests
    /// that the dispatch at the end of the same iteration must observe.
    pub fn step(&mut self) -> u32 {
        // Without a cartridge there is nothing to execute; burn idle cycles
        // so frame loops still terminate.
        if self.mmu.cart.is_none() {
            self.cpu.add_to_clock(4);
            return 4;
        }

        let cycles = self.cpu.step(&mut self.mmu);
        self.distribute(cycles);

        let dispatch = self.cpu.handle_interrupts(&mut self.mmu);
        if dispatch > 0 {
            self.distribute(dispatch);
        }

        cycles + dispatch
    }

    fn distribute(&mut self, cycles: u32) {
        self.cpu.add_to_clock(cycles);
        self.mmu.timer.step(cycles, &mut self.mmu.if_reg);
        self.mmu.ppu.step(cycles, &mut self.mmu.if_reg);
        self.mmu.apu.step(cycles);
    }

    /// Run one frame's worth of master cycles. The PPU's frame-ready flag
    /// signals when a new picture is available for the host.
    pub fn run_frame(&mut self) {
        let mut frame_cycles = 0;
        while frame_cycles < CYCLES_PER_FRAME {
            frame_cycles += self.step();
        }
    }

    /// Reset to the initial power-on state while preserving the loaded
    /// cartridge and boot ROM.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        let boot = self.mmu.boot_rom.take();
        self.cpu = Cpu::new();
        self.mmu = Mmu::new();
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
        if let Some(b) = boot {
            self.mmu.load_boot_rom(b);
            self.cpu = Cpu::new_power_on();
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
