pub mod core;
pub mod placements;
pub mod reference;
