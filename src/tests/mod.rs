mod common;
mod http_routes;
mod login_endpoint;
