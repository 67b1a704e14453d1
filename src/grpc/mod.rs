mod service;

// Generated proto code
pub mod proto {
    tonic::include_proto!("user.v1");
}

pub use service::UserGrpc;
