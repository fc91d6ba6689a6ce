/// Tally of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Images found under the images folder.
    pub discovered: usize,
    /// Images not processed because their key is already in the store (or no
    /// key could be derived for them).
    pub skipped: usize,
    /// Images run through the compression service.
    pub converted: usize,
    /// Images uploaded as they are.
    pub passed_through: usize,
    pub uploaded: usize,
    /// Images prepared but not sent because the store is read-only.
    pub staged: usize,
    pub failed: usize,
}

impl Report {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
