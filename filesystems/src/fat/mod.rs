// The FAT filesystem family: FAT12, FAT16 and FAT32.
// One driver handles all three; the variant is a runtime tag.

pub mod directory;
pub mod geometry;
pub mod names;
pub mod structures;
pub mod table;
pub mod timestamps;
pub mod volume;

pub use structures::{BiosParameterBlock, DirEntry, FatAttributes};
pub use table::FatTable;
pub use volume::FatVolume;
