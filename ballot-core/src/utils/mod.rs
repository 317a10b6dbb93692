pub mod retry;

/// Current UTC wall-clock time without an offset, matching `TIMESTAMP`
/// columns.
pub fn now_primitive() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

/// Start of a window of length `window` ending now.
///
/// `None` when the start would fall before the earliest representable
/// timestamp, in which case every stored row is inside the window.
pub fn window_start(window: time::Duration) -> Option<time::PrimitiveDateTime> {
    now_primitive().checked_sub(window)
}
