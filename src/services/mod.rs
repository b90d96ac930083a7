pub mod route_api;
