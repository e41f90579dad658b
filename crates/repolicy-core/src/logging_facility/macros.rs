//! Operation logging macros
//!
//! All three expand through `__log_op_event!`, so every line carries
//! `component` (the calling module), `op` and `event` in the same order.
//! Callers need neither `tracing` nor `repolicy-core-types` as direct
//! dependencies.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $op:expr, $event:expr $(, $($field:tt)*)?) => {
        $crate::__private::tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event
            $(, $($field)*)?
        )
    };
}

/// Log the start of an operation
///
/// ```
/// # use repolicy_core::log_op_start;
/// log_op_start!("resolve");
/// log_op_start!("evaluate_repository", repo = "svc-a");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::__private::schema::event::START
            $(, $($field)*)?
        )
    };
}

/// Log the successful end of an operation; `duration_ms` is required
///
/// ```
/// # use repolicy_core::log_op_end;
/// log_op_end!("resolve", duration_ms = 42);
/// log_op_end!("diff_repository", duration_ms = 3, repo = "svc-a", diff_count = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::__private::schema::event::END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Log a failed operation
///
/// `$err` is anything convertible into `ExError`; the event carries its
/// kind and stable code, plus run and request ids when the error has them.
///
/// ```
/// # use repolicy_core::log_op_error;
/// # use repolicy_core::errors::RemoteError;
/// log_op_error!("apply_repository", RemoteError::Cancelled, duration_ms = 10, repo = "svc-a");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = ::std::convert::Into::into($err);
        $crate::__log_op_event!(
            error,
            $op,
            $crate::__private::schema::event::END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            run_id = ex_err.run_id().map(|id| id.as_str()),
            request_id = ex_err.request_id().map(|id| id.as_str())
            $(, $($field)*)?
        )
    }};
}
