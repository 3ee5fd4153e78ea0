//! Region-aware crisis resources.

use withme_rs_protocol::{CrisisResources, Hotline, RegionOption};

/// Region code used when nothing else matches.
pub const INTERNATIONAL: &str = "INTL";

struct StaticHotline {
    name: &'static str,
    phone: &'static str,
    description: Option<&'static str>,
    hours: Option<&'static str>,
    url: Option<&'static str>,
}

struct StaticRegion {
    country: &'static str,
    code: &'static str,
    emergency: &'static str,
    hotlines: &'static [StaticHotline],
}

const fn line(
    name: &'static str,
    phone: &'static str,
    description: Option<&'static str>,
    hours: Option<&'static str>,
    url: Option<&'static str>,
) -> StaticHotline {
    StaticHotline {
        name,
        phone,
        description,
        hours,
        url,
    }
}

const REGIONS: &[StaticRegion] = &[
    StaticRegion {
        country: "United States",
        code: "US",
        emergency: "911",
        hotlines: &[
            line(
                "988 Suicide & Crisis Lifeline",
                "988",
                Some("Free, confidential support 24/7"),
                Some("24/7"),
                Some("https://988lifeline.org"),
            ),
            line(
                "Crisis Text Line",
                "Text HOME to 741741",
                Some("Free crisis counseling via text"),
                Some("24/7"),
                None,
            ),
        ],
    },
    StaticRegion {
        country: "United Kingdom",
        code: "GB",
        emergency: "999",
        hotlines: &[
            line(
                "Samaritans",
                "116 123",
                Some("Free emotional support"),
                Some("24/7"),
                Some("https://www.samaritans.org"),
            ),
            line(
                "Shout",
                "Text SHOUT to 85258",
                Some("Free crisis text service"),
                Some("24/7"),
                None,
            ),
        ],
    },
    StaticRegion {
        country: "Canada",
        code: "CA",
        emergency: "911",
        hotlines: &[
            line(
                "988 Suicide Crisis Helpline",
                "988",
                Some("National crisis line"),
                Some("24/7"),
                None,
            ),
            line(
                "Crisis Text Line",
                "Text CONNECT to 686868",
                Some("Free crisis support via text"),
                Some("24/7"),
                None,
            ),
        ],
    },
    StaticRegion {
        country: "Australia",
        code: "AU",
        emergency: "000",
        hotlines: &[
            line(
                "Lifeline",
                "13 11 14",
                Some("Crisis support and suicide prevention"),
                Some("24/7"),
                Some("https://www.lifeline.org.au"),
            ),
            line(
                "Beyond Blue",
                "1300 22 4636",
                Some("Anxiety, depression, and suicide prevention"),
                Some("24/7"),
                Some("https://www.beyondblue.org.au"),
            ),
        ],
    },
    StaticRegion {
        country: "Germany",
        code: "DE",
        emergency: "112",
        hotlines: &[
            line(
                "Telefonseelsorge",
                "0800 111 0 111",
                Some("Free crisis counseling"),
                Some("24/7"),
                None,
            ),
            line(
                "Telefonseelsorge (Catholic)",
                "0800 111 0 222",
                Some("Free crisis counseling"),
                Some("24/7"),
                None,
            ),
        ],
    },
    StaticRegion {
        country: "France",
        code: "FR",
        emergency: "112",
        hotlines: &[line(
            "SOS Amitié",
            "09 72 39 40 50",
            Some("Suicide prevention hotline"),
            Some("24/7"),
            Some("https://www.sos-amitie.com"),
        )],
    },
    StaticRegion {
        country: "India",
        code: "IN",
        emergency: "112",
        hotlines: &[
            line(
                "AASRA",
                "91-22-27546669",
                Some("Crisis intervention center"),
                Some("24/7"),
                Some("http://www.aasra.info"),
            ),
            line(
                "iCall",
                "9152987821",
                Some("Psychosocial helpline"),
                None,
                None,
            ),
        ],
    },
    StaticRegion {
        country: "Japan",
        code: "JP",
        emergency: "110",
        hotlines: &[
            line(
                "TELL Lifeline",
                "03-5774-0992",
                Some("English-language crisis support"),
                Some("9am-11pm"),
                Some("https://telljp.com"),
            ),
            line(
                "Yorisoi Hotline",
                "0120-279-338",
                Some("Free multilingual support"),
                Some("24/7"),
                None,
            ),
        ],
    },
    StaticRegion {
        country: "Brazil",
        code: "BR",
        emergency: "190",
        hotlines: &[line(
            "CVV",
            "188",
            Some("Centro de Valorização da Vida"),
            Some("24/7"),
            Some("https://www.cvv.org.br"),
        )],
    },
    StaticRegion {
        country: "International",
        code: INTERNATIONAL,
        emergency: "112",
        hotlines: &[
            line(
                "International Association for Suicide Prevention",
                "See website for local resources",
                Some("Find crisis centers worldwide"),
                None,
                Some("https://www.iasp.info/resources/Crisis_Centres/"),
            ),
            line(
                "Befrienders Worldwide",
                "See website",
                Some("Emotional support in 32 countries"),
                None,
                Some("https://www.befrienders.org"),
            ),
        ],
    },
];

impl StaticRegion {
    fn to_resources(&self) -> CrisisResources {
        CrisisResources {
            country: self.country.to_string(),
            country_code: self.code.to_string(),
            emergency_number: self.emergency.to_string(),
            hotlines: self
                .hotlines
                .iter()
                .map(|hotline| Hotline {
                    name: hotline.name.to_string(),
                    phone: hotline.phone.to_string(),
                    description: hotline.description.map(str::to_string),
                    hours: hotline.hours.map(str::to_string),
                    url: hotline.url.map(str::to_string),
                })
                .collect(),
        }
    }
}

fn find_region(code: &str) -> Option<&'static StaticRegion> {
    REGIONS
        .iter()
        .find(|region| region.code.eq_ignore_ascii_case(code.trim()))
}

/// Every region, international entry last.
pub fn all_resources() -> Vec<CrisisResources> {
    REGIONS.iter().map(StaticRegion::to_resources).collect()
}

/// Resources for a region code, or the international entry when unknown.
pub fn resources_for_region(code: &str) -> CrisisResources {
    find_region(code)
        .or_else(|| find_region(INTERNATIONAL))
        .map(StaticRegion::to_resources)
        .unwrap_or_else(|| CrisisResources {
            country: "International".to_string(),
            country_code: INTERNATIONAL.to_string(),
            emergency_number: "112".to_string(),
            hotlines: Vec::new(),
        })
}

/// Selectable regions; the international fallback is not offered.
pub fn region_options() -> Vec<RegionOption> {
    REGIONS
        .iter()
        .filter(|region| region.code != INTERNATIONAL)
        .map(|region| RegionOption {
            value: region.code.to_string(),
            label: region.country.to_string(),
        })
        .collect()
}
