pub mod api;

pub use api::ReqwestPeopleApi;
