mod scan;

pub use scan::run_scan_command;
