use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// IBM Cloud regions hosting the Speech to Text service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    /// Dallas
    #[default]
    UsSouth,
    /// Washington, D.C.
    UsEast,
    /// Frankfurt
    EuDe,
    /// London
    EuGb,
    /// Sydney
    AuSyd,
    /// Tokyo
    JpTok,
    /// Seoul
    KrSeo,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Self::UsSouth,
        Self::UsEast,
        Self::EuDe,
        Self::EuGb,
        Self::AuSyd,
        Self::JpTok,
        Self::KrSeo,
    ];

    pub fn hostname(&self) -> &'static str {
        match self {
            Self::UsSouth => "api.us-south.speech-to-text.watson.cloud.ibm.com",
            Self::UsEast => "api.us-east.speech-to-text.watson.cloud.ibm.com",
            Self::EuDe => "api.eu-de.speech-to-text.watson.cloud.ibm.com",
            Self::EuGb => "api.eu-gb.speech-to-text.watson.cloud.ibm.com",
            Self::AuSyd => "api.au-syd.speech-to-text.watson.cloud.ibm.com",
            Self::JpTok => "api.jp-tok.speech-to-text.watson.cloud.ibm.com",
            Self::KrSeo => "api.kr-seo.speech-to-text.watson.cloud.ibm.com",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsSouth => "us-south",
            Self::UsEast => "us-east",
            Self::EuDe => "eu-de",
            Self::EuGb => "eu-gb",
            Self::AuSyd => "au-syd",
            Self::JpTok => "jp-tok",
            Self::KrSeo => "kr-seo",
        }
    }

    /// Service URL of a service instance in this region.
    pub fn instance_url(&self, instance_id: &str) -> String {
        format!("https://{}/instances/{instance_id}", self.hostname())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|region| region.as_str() == wanted)
            .ok_or_else(|| format!("Unknown IBM Cloud region '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_round_trip_names() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>(), Ok(region));
        }
        assert_eq!("EU-GB".parse::<Region>(), Ok(Region::EuGb));
        assert!("mars-north".parse::<Region>().is_err());
    }

    #[test]
    fn test_instance_url() {
        assert_eq!(
            Region::EuDe.instance_url("abc-123"),
            "https://api.eu-de.speech-to-text.watson.cloud.ibm.com/instances/abc-123"
        );
    }
}
