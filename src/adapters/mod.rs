pub mod console_report;
pub mod csv_adapter;
pub mod file_config_adapter;
