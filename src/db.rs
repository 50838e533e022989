pub mod field_type;
pub mod geodata_archive;
pub mod geodata_table;
pub mod reference_table;
pub mod vector_source;
