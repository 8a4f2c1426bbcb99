#[cfg(feature = "integration_bang_olufsen")]
mod bang_olufsen;
