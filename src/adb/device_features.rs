//! Parses the feature banner adbd sends as the `data` payload of its CNXN
//! reply.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub features: HashSet<String>,
}

impl DeviceFeatures {
    /// Parses both banner shapes real adbd has shipped:
    /// `device::ro.product...;features=shell_v2,cmd,...` (key=value pairs
    /// separated by `;`, with a `features` key), and a bare
    /// `shell_v2,cmd,...` comma list with no `::`/`;` structure at all.
    pub fn from_cnxn(banner: &str) -> DeviceFeatures {
        let body = match banner.split_once("::") {
            Some((_, rest)) => rest,
            None => banner,
        };

        if body.contains('=') {
            for pair in body.split(';') {
                if let Some((key, value)) = pair.split_once('=') {
                    if key == "features" {
                        return DeviceFeatures {
                            features: value.split(',').map(|s| s.to_string()).filter(|s| !s.is_empty()).collect(),
                        };
                    }
                }
            }
            DeviceFeatures::default()
        } else {
            DeviceFeatures {
                features: body.split(',').map(|s| s.to_string()).filter(|s| !s.is_empty()).collect(),
            }
        }
    }

    pub fn has(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn shell_v2(&self) -> bool {
        self.has("shell_v2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_banner_with_device_prefix() {
        let banner = "device::ro.product.name=walleye;features=shell_v2,cmd,stat_v2";
        let features = DeviceFeatures::from_cnxn(banner);
        assert!(features.shell_v2());
        assert!(features.has("cmd"));
        assert!(!features.has("abb"));
    }

    #[test]
    fn parses_bare_comma_list_banner() {
        let features = DeviceFeatures::from_cnxn("shell_v2,cmd,stat_v2");
        assert!(features.shell_v2());
        assert!(features.has("stat_v2"));
    }

    #[test]
    fn missing_features_key_yields_empty_set() {
        let features = DeviceFeatures::from_cnxn("device::ro.product.name=walleye");
        assert!(!features.shell_v2());
        assert!(features.features.is_empty());
    }
}
