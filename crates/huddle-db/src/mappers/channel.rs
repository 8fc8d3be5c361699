//! Channel entity <-> model mapper

use std::collections::HashMap;

use huddle_core::{Channel, Overwrite, Permissions, Snowflake};

use super::variant_from_i16;
use crate::models::{ChannelModel, OverwriteModel};

impl From<OverwriteModel> for Overwrite {
    fn from(model: OverwriteModel) -> Self {
        Overwrite {
            id: Snowflake::new(model.target_id),
            kind: variant_from_i16(model.kind),
            allow: Permissions::from_i64(model.allow_bits),
            deny: Permissions::from_i64(model.deny_bits),
        }
    }
}

impl From<ChannelModel> for Channel {
    fn from(model: ChannelModel) -> Self {
        Channel {
            id: Snowflake::new(model.id),
            kind: variant_from_i16(model.kind),
            name: model.name,
            description: model.description,
            position: model.position,
            parent: model.parent_id.map(Snowflake::new),
            overwrites: Vec::new(),
        }
    }
}

/// Attach overwrite rows to their channels, keeping the channel order.
pub fn assemble_channels(channels: Vec<ChannelModel>, overwrites: Vec<OverwriteModel>) -> Vec<Channel> {
    let mut by_channel: HashMap<i64, Vec<Overwrite>> = HashMap::new();
    for row in overwrites {
        by_channel.entry(row.channel_id).or_default().push(row.into());
    }

    channels
        .into_iter()
        .map(|model| {
            let overwrites = by_channel.remove(&model.id).unwrap_or_default();
            let mut channel = Channel::from(model);
            channel.overwrites = overwrites;
            channel
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::OverwriteKind;

    #[test]
    fn test_assemble_channels() {
        let channels = vec![
            ChannelModel {
                id: 1,
                kind: 0,
                name: "general".into(),
                description: String::new(),
                position: 0,
                parent_id: None,
            },
            ChannelModel {
                id: 2,
                kind: 0,
                name: "staff".into(),
                description: String::new(),
                position: 1,
                parent_id: Some(1),
            },
        ];
        let overwrites = vec![OverwriteModel {
            channel_id: 2,
            target_id: 9,
            kind: 1,
            allow_bits: 0,
            deny_bits: Permissions::VIEW_CHANNEL.to_i64(),
        }];

        let result = assemble_channels(channels, overwrites);
        assert!(result[0].overwrites.is_empty());
        assert_eq!(result[1].parent, Some(Snowflake::new(1)));
        assert_eq!(result[1].overwrites[0].kind, OverwriteKind::User);
        assert_eq!(result[1].overwrites[0].deny, Permissions::VIEW_CHANNEL);
    }
}
