/// The supported formats for the per-VOT prediction report.
///
/// Integration notes:
/// - With the `cli` feature, `ValueEnum` lets this enum be used directly as a CLI flag.
/// - Each variant maps to a concrete `VotEncoder` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputType {
    /// One row per predicted VOT, with a header row.
    #[default]
    Csv,

    /// A single JSON array of prediction records.
    Json,
}
