mod datacenter;

pub use datacenter::DatacenterRegistry;
