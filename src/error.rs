pub trait LogErrorExt<T, E> {
    /// Converts into an `Option`, logging the error at `level`.
    fn ok_or_log(self, level: log::Level) -> Option<T>;
}

impl<T, E> LogErrorExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_or_log(self, level: log::Level) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::log!(level, "{err}");
                None
            }
        }
    }
}
