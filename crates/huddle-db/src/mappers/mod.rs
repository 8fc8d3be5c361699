//! Entity <-> model mappers

mod channel;
mod message;
mod role;
mod settings;
mod user;

pub use channel::assemble_channels;
pub use message::{assemble_messages, ids_to_i64, ids_from_i64};

/// Decode a SMALLINT discriminator, falling back to the default variant for
/// values this build does not know.
pub(crate) fn variant_from_i16<T>(value: i16) -> T
where
    T: TryFrom<u8> + Default,
{
    u8::try_from(value)
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::ChannelKind;

    #[test]
    fn test_variant_from_i16() {
        assert_eq!(variant_from_i16::<ChannelKind>(2), ChannelKind::Category);
        assert_eq!(variant_from_i16::<ChannelKind>(-1), ChannelKind::Text);
        assert_eq!(variant_from_i16::<ChannelKind>(99), ChannelKind::Text);
    }
}
