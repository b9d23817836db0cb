use hbnb::StorageError;

fn main() {
    if let Err(err) = hbnb::app::run() {
        log::error!("❌ {:#}", err);
        let client_error = err
            .downcast_ref::<StorageError>()
            .is_some_and(StorageError::is_client_error);
        std::process::exit(if client_error { 2 } else { 1 });
    }
}
