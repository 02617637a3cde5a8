pub mod capture;
pub mod exchange;
pub mod method;
pub mod request;
pub mod stub;
pub mod transport;

pub use capture::ResponseCapture;
pub use exchange::Exchange;
pub use method::HttpMethod;
pub use request::{RequestBody, RequestDescriptor};
pub use transport::{ReqwestTransport, Transport, TransportConfig};
