/// The L2 block heights at which the protocol forks activate.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ForkHeights {
    /// The first L2 block of the Ontake fork.
    pub ontake: u64,
    /// The first batch id and L2 block of the Pacaya fork.
    pub pacaya: u64,
}

impl ForkHeights {
    /// Returns a new instance of [`ForkHeights`].
    pub const fn new(ontake: u64, pacaya: u64) -> Self {
        Self { ontake, pacaya }
    }

    /// Returns true if the block belongs to the Pacaya fork.
    pub const fn is_pacaya(&self, block_id: u64) -> bool {
        block_id >= self.pacaya
    }
}
