pub mod dispatch_loop;
pub mod health_server;
