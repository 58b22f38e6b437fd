mod manager;

pub use manager::HostsManager;
