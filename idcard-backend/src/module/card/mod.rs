///! Member card module
///!
///! ## Main Components
///! - `CardRenderer`: record -> SVG card, interactive or export mode
///! - `Snapshotter`: card -> raster bytes (`ResvgSnapshotter` in production)

mod renderer;
pub use renderer::{CardRenderer, CardView, RenderMode, escape_xml};

mod snapshot;
pub use snapshot::{ResvgSnapshotter, SnapshotError, Snapshotter};
