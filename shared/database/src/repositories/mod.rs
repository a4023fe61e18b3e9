pub mod audit;
pub mod collaborator;
pub mod definition;
pub mod request;

pub use audit::{AuditFilter, AuditRepository};
pub use collaborator::CollaboratorRepository;
pub use definition::DefinitionRepository;
pub use request::{RequestFilter, RequestRepository};
