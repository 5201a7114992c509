//! Container inventory: pure registry helpers plus the Docker CLI seam.

mod docker;
mod registry;

pub use docker::{ContainerManager, DockerCli};
pub use registry::{
    effective_port, find_port_collision, group_services, normalize_services, suggest_port,
};
