/// Routes panics through tracing so they land in the log file, then prints a
/// short line to stderr for whoever is watching the process.
pub fn set() {
    std::panic::set_hook(Box::new(|info| {
        let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            info.to_string()
        };

        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        tracing::error!(panic = %msg, %location, "thread panicked");
        eprintln!("Panic: {msg:?} at {location}");
    }));
}
