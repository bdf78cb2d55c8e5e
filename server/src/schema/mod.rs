mod presence_table;
mod raid_settings_table;
mod raid_table;
mod structure_table;

pub use presence_table::*;
pub use raid_settings_table::*;
pub use raid_table::*;
pub use structure_table::*;
