use std::sync::atomic::{AtomicBool, Ordering};

/// Set on the first SIGINT/SIGTERM (Ctrl-C / Ctrl-Break / close on Windows).
pub(crate) static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

pub(crate) fn is_cancel_requested() -> bool {
    CANCEL_REQUESTED.load(Ordering::SeqCst)
}

/// Install handlers that turn the first interrupt into a cancellation
/// request. The default handler is restored afterwards, so a second
/// interrupt terminates the process.
pub(crate) fn install_signal_handlers() {
    #[cfg(unix)]
    {
        // Safety: the handler only stores an atomic bool and resets the disposition.
        unsafe {
            libc::signal(
                libc::SIGTERM,
                unix_signal_handler as *const () as libc::sighandler_t,
            );
            libc::signal(
                libc::SIGINT,
                unix_signal_handler as *const () as libc::sighandler_t,
            );
        }
    }

    #[cfg(windows)]
    {
        unsafe {
            windows_sys::Win32::System::Console::SetConsoleCtrlHandler(
                Some(windows_console_handler),
                1,
            );
        }
    }
}

#[cfg(unix)]
extern "C" fn unix_signal_handler(sig: libc::c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
    }
}

#[cfg(windows)]
unsafe extern "system" fn windows_console_handler(ctrl_type: u32) -> i32 {
    // CTRL_C_EVENT (0), CTRL_BREAK_EVENT (1), CTRL_CLOSE_EVENT (2)
    if ctrl_type <= 2 {
        CANCEL_REQUESTED.store(true, Ordering::SeqCst);
        unsafe {
            windows_sys::Win32::System::Console::SetConsoleCtrlHandler(
                Some(windows_console_handler),
                0,
            );
        }
        return 1;
    }
    0
}
