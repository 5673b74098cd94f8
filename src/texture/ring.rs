// ring.rs - Double-buffered render targets
//
// Six simulation fields, each a pair of grids with a "previous" (readable)
// and "next" (writable) role, plus the one framebuffer every pass renders
// through. Which field lands in which color attachment, and which field
// each sampler unit reads, is rebound by the sequencer before every draw.

use std::mem;

use glam::Vec2;

use super::{Grid, texel_center};
use crate::codec::{Range, Texel};
use crate::error::{FluidError, Result};

/// Color attachment slots on the simulation framebuffer
pub const COLOR_ATTACHMENTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    VelocityX,
    VelocityY,
    VelocityTempX,
    VelocityTempY,
    Density,
    DensityTemp,
}

impl Field {
    pub const ALL: [Field; COLOR_ATTACHMENTS] = [
        Field::VelocityX,
        Field::VelocityY,
        Field::VelocityTempX,
        Field::VelocityTempY,
        Field::Density,
        Field::DensityTemp,
    ];

    /// Attachment location / sampler unit conventionally used for this field
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
struct DoubleBuffer {
    grids: [Grid; 2],
    previous: usize,
}

impl DoubleBuffer {
    fn new(w: u32, h: u32) -> Self {
        Self { grids: [Grid::new(w, h), Grid::new(w, h)], previous: 0 }
    }

    fn previous(&self) -> &Grid {
        &self.grids[self.previous]
    }

    fn next(&self) -> &Grid {
        &self.grids[self.previous ^ 1]
    }

    fn next_mut(&mut self) -> &mut Grid {
        &mut self.grids[self.previous ^ 1]
    }

    fn swap(&mut self) {
        self.previous ^= 1;
    }
}

/// Color attachment table of the simulation framebuffer
#[derive(Debug, Clone, Default)]
pub struct Framebuffer {
    attachments: [Option<Field>; COLOR_ATTACHMENTS],
}

impl Framebuffer {
    /// Attach the next-role grid of `field` at `slot`, or detach with `None`.
    /// A field is attached at most once; attaching it elsewhere moves it.
    pub fn attach(&mut self, slot: usize, field: Option<Field>) {
        if let Some(f) = field {
            for a in self.attachments.iter_mut() {
                if *a == Some(f) {
                    *a = None;
                }
            }
        }
        self.attachments[slot] = field;
    }

    pub fn attachment(&self, slot: usize) -> Option<Field> {
        self.attachments[slot]
    }

    pub fn detach_all(&mut self) {
        self.attachments = [None; COLOR_ATTACHMENTS];
    }

    pub fn attached(&self) -> impl Iterator<Item = Field> + '_ {
        self.attachments.iter().flatten().copied()
    }
}

/// Which field's previous-role grid each sampler unit reads
#[derive(Debug, Clone, Default)]
pub struct SamplerBindings {
    units: [Option<Field>; COLOR_ATTACHMENTS],
}

impl SamplerBindings {
    pub fn bind(&mut self, unit: Field, source: Option<Field>) {
        self.units[unit.slot()] = source;
    }

    pub fn bound(&self, unit: Field) -> Option<Field> {
        self.units[unit.slot()]
    }
}

/// Read-only view handed to the fragment function during a draw.
/// Unbound units read as zero.
pub struct Samplers<'a> {
    units: [Option<&'a Grid>; COLOR_ATTACHMENTS],
}

impl<'a> Samplers<'a> {
    pub fn grid(&self, unit: Field) -> Option<&'a Grid> {
        self.units[unit.slot()]
    }

    /// Filtered value of `unit` at `uv`
    #[inline]
    pub fn sample(&self, unit: Field, uv: Vec2, range: Range) -> f32 {
        self.grid(unit).map_or(0.0, |g| g.sample(uv, range))
    }

    /// Raw texel of `unit` under `uv`
    #[inline]
    pub fn texel(&self, unit: Field, uv: Vec2) -> Texel {
        self.grid(unit).map_or([0; 4], |g| g.texel_at(uv))
    }
}

/// Values written by one fragment, by attachment slot. `None` leaves the
/// target texel holding its previous-role value.
pub type FragmentOutputs = [Option<Texel>; COLOR_ATTACHMENTS];

#[derive(Debug, Default)]
pub struct TextureRing {
    w: u32,
    h: u32,
    buffers: [DoubleBuffer; COLOR_ATTACHMENTS],
    framebuffer: Framebuffer,
    generation: u64,
}

impl TextureRing {
    /// Unallocated ring; call [`TextureRing::allocate`] before drawing
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)create all six double buffers at `w` x `h`, zeroed.
    /// Prior contents are discarded.
    pub fn allocate(&mut self, w: u32, h: u32) -> Result<()> {
        if w == 0 || h == 0 {
            return Err(FluidError::InvalidSize { width: w, height: h });
        }

        // Drop the old grids before building the new set
        self.release();
        self.buffers = std::array::from_fn(|_| DoubleBuffer::new(w, h));
        self.w = w;
        self.h = h;
        self.generation += 1;

        log::info!("simulation grids of resolution {w}x{h} created");
        Ok(())
    }

    /// Free every grid. The ring reads as unallocated afterwards.
    pub fn release(&mut self) {
        self.buffers = Default::default();
        self.framebuffer.detach_all();
        self.w = 0;
        self.h = 0;
    }

    pub fn is_allocated(&self) -> bool { self.w > 0 && self.h > 0 }
    pub fn width(&self) -> u32 { self.w }
    pub fn height(&self) -> u32 { self.h }
    /// Bumped on every allocation
    pub fn generation(&self) -> u64 { self.generation }

    pub fn framebuffer(&self) -> &Framebuffer { &self.framebuffer }
    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer { &mut self.framebuffer }

    /// (previous, next) grids of `field`
    pub fn current_pair(&self, field: Field) -> (&Grid, &Grid) {
        let b = &self.buffers[field.slot()];
        (b.previous(), b.next())
    }

    /// Readable grid of `field`
    pub fn previous(&self, field: Field) -> &Grid {
        self.buffers[field.slot()].previous()
    }

    /// Index (0/1) of the grid currently in the previous role
    pub fn previous_index(&self, field: Field) -> usize {
        self.buffers[field.slot()].previous
    }

    /// Exchange previous/next roles of `field`
    pub fn swap(&mut self, field: Field) {
        self.buffers[field.slot()].swap();
    }

    /// Swap every field currently attached to the framebuffer
    pub fn swap_attached(&mut self) {
        let attached: Vec<Field> = self.framebuffer.attached().collect();
        for field in attached {
            self.swap(field);
        }
    }

    /// Full-screen draw: run `shade` once per texel centre, reading through
    /// `bindings` and writing into whatever is attached to the framebuffer.
    pub fn draw<F>(&mut self, bindings: &SamplerBindings, mut shade: F) -> Result<()>
    where
        F: FnMut(Vec2, &Samplers<'_>) -> FragmentOutputs,
    {
        if !self.is_allocated() {
            return Err(FluidError::NotAllocated);
        }
        let (w, h) = (self.w, self.h);

        // Move attached targets out so previous-role grids stay readable
        let mut targets: [Option<Grid>; COLOR_ATTACHMENTS] = Default::default();
        for (slot, target) in targets.iter_mut().enumerate() {
            if let Some(field) = self.framebuffer.attachment(slot) {
                *target = Some(mem::take(self.buffers[field.slot()].next_mut()));
            }
        }

        {
            let buffers = &self.buffers;
            let fb = &self.framebuffer;
            let samplers = Samplers {
                units: std::array::from_fn(|unit| {
                    bindings.units[unit].map(|f| buffers[f.slot()].previous())
                }),
            };

            for y in 0..h {
                for x in 0..w {
                    let outputs = shade(texel_center(x, y, w, h), &samplers);
                    for (slot, target) in targets.iter_mut().enumerate() {
                        let Some(target) = target else { continue };
                        let texel = match outputs[slot] {
                            Some(t) => t,
                            None => match fb.attachment(slot) {
                                Some(f) => buffers[f.slot()].previous().fetch(x as i32, y as i32),
                                None => continue,
                            },
                        };
                        target.store(x as i32, y as i32, texel);
                    }
                }
            }
        }

        for (slot, target) in targets.into_iter().enumerate() {
            if let (Some(grid), Some(field)) = (target, self.framebuffer.attachment(slot)) {
                *self.buffers[field.slot()].next_mut() = grid;
            }
        }
        Ok(())
    }
}
