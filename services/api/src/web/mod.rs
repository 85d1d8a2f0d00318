pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use rest::{
    create_annotation_handler, create_document_handler, create_version_handler,
    delete_document_handler, fetch_document_handler, resolve_annotation_handler,
    save_body_handler, set_status_handler, set_title_handler,
};
