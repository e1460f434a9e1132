pub mod priority_table;
pub mod skip_list;

pub use priority_table::PriorityTable;
pub use skip_list::SkipList;
