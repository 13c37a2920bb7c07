// Console diagnostics, printed only when the client runs with `debug: true`.

/// Prints a progress line with a gradient `[EDUSPHERE]` tag.
macro_rules! debug_log {
    ($debug:expr, $($arg:tt)*) => {
        if $debug {
            let line = format!($($arg)*);

            #[cfg(windows)]
            println!("[EDUSPHERE] {}", line);

            #[cfg(not(windows))]
            println!(
                "{} {}",
                colorful::Colorful::gradient_with_color(
                    "[EDUSPHERE]",
                    colorful::Color::Cyan,
                    colorful::Color::SpringGreen4
                ),
                line
            );
        }
    };
}

/// Prints a failure line to stderr with a red gradient tag.
macro_rules! warn_log {
    ($debug:expr, $($arg:tt)*) => {
        if $debug {
            let line = format!($($arg)*);

            #[cfg(windows)]
            eprintln!("[EDUSPHERE] {}", line);

            #[cfg(not(windows))]
            eprintln!(
                "{} {}",
                colorful::Colorful::gradient_with_color(
                    "[EDUSPHERE]",
                    colorful::Color::Red,
                    colorful::Color::Yellow
                ),
                line
            );
        }
    };
}
