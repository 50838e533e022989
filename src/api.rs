pub mod open_data_portal;
