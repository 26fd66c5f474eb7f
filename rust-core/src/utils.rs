//! 浏览器侧的辅助工具：panic hook 与控制台日志。

/// Formats its arguments and writes them to the browser console.
#[macro_export]
macro_rules! console_log {
    ($($arg:tt)*) => {
        $crate::utils::log(&format!($($arg)*))
    };
}

#[cfg(target_arch = "wasm32")]
pub fn log(message: &str) {
    web_sys::console::log_1(&message.into());
}

// Native builds (unit tests) have no console to write to.
#[cfg(not(target_arch = "wasm32"))]
pub fn log(_message: &str) {}

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}
