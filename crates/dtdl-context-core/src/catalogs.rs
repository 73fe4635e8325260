use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;

use crate::dtmi::{Dtmi, Identifier};
use crate::vocabulary::{VersionedVocabulary, VocabularyHistory};

/// Scheme word of identifier syntax; never usable as a term.
pub const DTMI_SCHEME: &str = "dtmi";
pub const DTMI_PREFIX: &str = "dtmi:";

/// Version-stripped identifier of the DTDL language context.
pub const DTDL_CONTEXT_NAME: &str = "dtmi:dtdl:context";

/// Whether a context specifier names the DTDL language context, in any
/// version (including none).
pub fn is_dtdl_context_specifier(specifier: &str) -> bool {
    let name = specifier.split([';', '#']).next().unwrap_or(specifier);
    name == DTDL_CONTEXT_NAME
}

// ---------------------------------------------------------------------------
// DTDL language vocabulary, versions 2 through 4
// ---------------------------------------------------------------------------

const V2_CLASSES: &[&str] = &[
    "Interface",
    "Telemetry",
    "Property",
    "Command",
    "Relationship",
    "Component",
    "CommandPayload",
    "Array",
    "Enum",
    "EnumValue",
    "Map",
    "MapKey",
    "MapValue",
    "Object",
    "Field",
];

const V2_PROPERTIES: &[&str] = &[
    "comment",
    "commandType",
    "contents",
    "description",
    "displayName",
    "elementSchema",
    "enumValue",
    "enumValues",
    "extends",
    "fields",
    "mapKey",
    "mapValue",
    "maxMultiplicity",
    "minMultiplicity",
    "name",
    "properties",
    "request",
    "response",
    "schema",
    "schemas",
    "target",
    "unit",
    "valueSchema",
    "writable",
];

const V2_SCHEMAS: &[&str] = &[
    "boolean", "date", "dateTime", "double", "duration", "float", "integer", "long", "string",
    "time",
];

const V2_COMMAND_TYPES: &[&str] = &["synchronous", "asynchronous"];

// Semantic types and units were core terms in v2 and moved to the
// quantitativeTypes extension in v3; they stay reserved in the core family.
const V2_SEMANTIC_TYPES: &[&str] = &[
    "Acceleration",
    "Angle",
    "AngularAcceleration",
    "AngularVelocity",
    "Area",
    "Current",
    "DataRate",
    "DataSize",
    "Distance",
    "Energy",
    "Force",
    "Frequency",
    "Humidity",
    "Illuminance",
    "Length",
    "Mass",
    "Power",
    "Pressure",
    "RelativeHumidity",
    "Temperature",
    "TimeSpan",
    "Velocity",
    "Voltage",
    "Volume",
];

const V2_UNITS: &[&str] = &[
    "metrePerSecondSquared",
    "radian",
    "degreeOfArc",
    "squareMetre",
    "ampere",
    "bitPerSecond",
    "byte",
    "metre",
    "kilometre",
    "joule",
    "newton",
    "hertz",
    "kilogram",
    "watt",
    "pascal",
    "percent",
    "degreeCelsius",
    "kelvin",
    "second",
    "metrePerSecond",
    "volt",
    "litre",
];

const V3_CLASSES: &[&str] = &[
    "Interface",
    "Telemetry",
    "Property",
    "Command",
    "Relationship",
    "Component",
    "CommandRequest",
    "CommandResponse",
    "Array",
    "Enum",
    "EnumValue",
    "Map",
    "MapKey",
    "MapValue",
    "Object",
    "Field",
];

const V3_PROPERTIES: &[&str] = &[
    "comment",
    "contents",
    "description",
    "displayName",
    "elementSchema",
    "enumValue",
    "enumValues",
    "extends",
    "fields",
    "mapKey",
    "mapValue",
    "maxMultiplicity",
    "minMultiplicity",
    "name",
    "nullable",
    "properties",
    "request",
    "response",
    "schema",
    "schemas",
    "target",
    "valueSchema",
    "writable",
];

const V3_SCHEMAS: &[&str] = &[
    "boolean",
    "byte",
    "bytes",
    "date",
    "dateTime",
    "decimal",
    "double",
    "duration",
    "float",
    "integer",
    "long",
    "short",
    "string",
    "time",
    "unsignedByte",
    "unsignedInteger",
    "unsignedLong",
    "unsignedShort",
    "uuid",
];

const V4_EXTRA_SCHEMAS: &[&str] = &["scaledDecimal"];

fn dtmi(text: &str) -> Identifier {
    Identifier::Dtmi(Dtmi::parse(text).expect("catalog identifiers are well-formed DTMIs"))
}

fn dtdl_vocabulary(
    version: u32,
    classes: &[&str],
    properties: &[&str],
    schemas: &[&[&str]],
) -> VersionedVocabulary {
    let mut terms: IndexMap<String, Identifier> = IndexMap::new();
    for class in classes {
        terms.insert(
            class.to_string(),
            dtmi(&format!("dtmi:dtdl:class:{class};{version}")),
        );
    }
    for property in properties {
        terms.insert(
            property.to_string(),
            dtmi(&format!("dtmi:dtdl:property:{property};{version}")),
        );
    }
    for schema in schemas.iter().flat_map(|s| s.iter()) {
        terms.insert(
            schema.to_string(),
            dtmi(&format!("dtmi:dtdl:instance:Schema:{schema};{version}")),
        );
    }
    if version == 2 {
        for command_type in V2_COMMAND_TYPES {
            terms.insert(
                command_type.to_string(),
                dtmi(&format!("dtmi:dtdl:instance:CommandType:{command_type};2")),
            );
        }
        for semantic_type in V2_SEMANTIC_TYPES {
            terms.insert(
                semantic_type.to_string(),
                dtmi(&format!("dtmi:standard:class:{semantic_type};2")),
            );
        }
        for unit in V2_UNITS {
            terms.insert(unit.to_string(), dtmi(&format!("dtmi:standard:unit:{unit};2")));
        }
    }

    let mut prefixes = IndexMap::new();
    prefixes.insert("dtdl".to_string(), "dtmi:dtdl:".to_string());

    VersionedVocabulary::new(version, 0, terms, prefixes)
        .expect("DTDL catalog terms and prefixes are disjoint")
}

/// The DTDL language context across all released versions.
pub static DTDL_CONTEXT_HISTORY: LazyLock<Arc<VocabularyHistory>> = LazyLock::new(|| {
    let versions = [
        dtdl_vocabulary(2, V2_CLASSES, V2_PROPERTIES, &[V2_SCHEMAS]),
        dtdl_vocabulary(3, V3_CLASSES, V3_PROPERTIES, &[V3_SCHEMAS]),
        dtdl_vocabulary(4, V3_CLASSES, V3_PROPERTIES, &[V3_SCHEMAS, V4_EXTRA_SCHEMAS]),
    ];
    Arc::new(
        VocabularyHistory::with_versions(DTDL_CONTEXT_NAME, versions)
            .expect("DTDL catalog versions are distinct"),
    )
});

// ---------------------------------------------------------------------------
// Endogenous extension vocabularies
// ---------------------------------------------------------------------------

/// `(term, kind)` pairs; kind becomes the identifier path segment.
struct ExtensionVersion {
    major: u32,
    terms: &'static [(&'static str, &'static str)],
}

struct ExtensionFamily {
    name: &'static str,
    versions: &'static [ExtensionVersion],
}

const QUANTITATIVE_TYPES_V1: &[(&str, &str)] = &[
    ("Acceleration", "class"),
    ("Angle", "class"),
    ("Area", "class"),
    ("Distance", "class"),
    ("Energy", "class"),
    ("Force", "class"),
    ("Frequency", "class"),
    ("Length", "class"),
    ("Mass", "class"),
    ("Power", "class"),
    ("Pressure", "class"),
    ("Temperature", "class"),
    ("TimeSpan", "class"),
    ("Velocity", "class"),
    ("Voltage", "class"),
    ("AccelerationUnit", "class"),
    ("AngleUnit", "class"),
    ("LengthUnit", "class"),
    ("TemperatureUnit", "class"),
    ("TimeUnit", "class"),
    ("unit", "property"),
    ("metrePerSecondSquared", "unit"),
    ("radian", "unit"),
    ("degreeOfArc", "unit"),
    ("squareMetre", "unit"),
    ("metre", "unit"),
    ("kilometre", "unit"),
    ("joule", "unit"),
    ("newton", "unit"),
    ("hertz", "unit"),
    ("kilogram", "unit"),
    ("watt", "unit"),
    ("pascal", "unit"),
    ("degreeCelsius", "unit"),
    ("kelvin", "unit"),
    ("second", "unit"),
    ("metrePerSecond", "unit"),
    ("volt", "unit"),
];

const HISTORIZATION_V1: &[(&str, &str)] = &[("Historized", "class")];

const ANNOTATION_V1: &[(&str, &str)] = &[("ValueAnnotation", "class"), ("annotates", "property")];

const OVERRIDING_V1: &[(&str, &str)] = &[("Override", "class"), ("overrides", "property")];

const REQUIREMENT_V1: &[(&str, &str)] = &[("Required", "class")];

const MQTT_V1: &[(&str, &str)] = &[
    ("Mqtt", "class"),
    ("Indexed", "class"),
    ("telemetryTopic", "property"),
    ("commandTopic", "property"),
    ("payloadFormat", "property"),
    ("index", "property"),
];

const MQTT_V2: &[(&str, &str)] = &[
    ("Mqtt", "class"),
    ("Indexed", "class"),
    ("Idempotent", "class"),
    ("Cacheable", "class"),
    ("telemetryTopic", "property"),
    ("commandTopic", "property"),
    ("payloadFormat", "property"),
    ("telemetryServiceGroupId", "property"),
    ("cmdServiceGroupId", "property"),
    ("index", "property"),
    ("ttl", "property"),
];

const ENDOGENOUS_FAMILIES: &[ExtensionFamily] = &[
    ExtensionFamily {
        name: "dtmi:dtdl:extension:quantitativeTypes",
        versions: &[ExtensionVersion {
            major: 1,
            terms: QUANTITATIVE_TYPES_V1,
        }],
    },
    ExtensionFamily {
        name: "dtmi:dtdl:extension:historization",
        versions: &[ExtensionVersion {
            major: 1,
            terms: HISTORIZATION_V1,
        }],
    },
    ExtensionFamily {
        name: "dtmi:dtdl:extension:annotation",
        versions: &[ExtensionVersion {
            major: 1,
            terms: ANNOTATION_V1,
        }],
    },
    ExtensionFamily {
        name: "dtmi:dtdl:extension:overriding",
        versions: &[ExtensionVersion {
            major: 1,
            terms: OVERRIDING_V1,
        }],
    },
    ExtensionFamily {
        name: "dtmi:dtdl:extension:requirement",
        versions: &[ExtensionVersion {
            major: 1,
            terms: REQUIREMENT_V1,
        }],
    },
    ExtensionFamily {
        name: "dtmi:dtdl:extension:mqtt",
        versions: &[
            ExtensionVersion {
                major: 1,
                terms: MQTT_V1,
            },
            ExtensionVersion {
                major: 2,
                terms: MQTT_V2,
            },
        ],
    },
];

fn extension_vocabulary(family: &str, version: &ExtensionVersion) -> VersionedVocabulary {
    let terms = version
        .terms
        .iter()
        .map(|(term, kind)| {
            (
                term.to_string(),
                dtmi(&format!("{family}:v{}:{kind}:{term}", version.major)),
            )
        })
        .collect();
    VersionedVocabulary::new(version.major, 0, terms, IndexMap::new())
        .expect("extension catalogs define no prefixes")
}

/// Extension vocabularies compiled into the engine, keyed by family name.
pub static ENDOGENOUS_CONTEXT_HISTORIES: LazyLock<Arc<IndexMap<String, VocabularyHistory>>> =
    LazyLock::new(|| {
        let histories = ENDOGENOUS_FAMILIES
            .iter()
            .map(|family| {
                let history = VocabularyHistory::with_versions(
                    family.name,
                    family
                        .versions
                        .iter()
                        .map(|v| extension_vocabulary(family.name, v)),
                )
                .expect("extension catalog versions are distinct");
                (family.name.to_string(), history)
            })
            .collect();
        Arc::new(histories)
    });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtdl_history_has_all_versions() {
        let versions: Vec<u32> = DTDL_CONTEXT_HISTORY
            .available_versions()
            .iter()
            .map(|v| v.major)
            .collect();
        assert_eq!(versions, vec![2, 3, 4]);
    }

    #[test]
    fn v2_semantic_types_remain_reserved() {
        let v3 = DTDL_CONTEXT_HISTORY.try_get_matching_version(3, 0).unwrap();
        assert!(v3.term("Temperature").is_none());
        assert!(DTDL_CONTEXT_HISTORY.is_term_reserved("Temperature"));
    }

    #[test]
    fn versioned_core_identifiers() {
        let v3 = DTDL_CONTEXT_HISTORY.try_get_matching_version(3, 0).unwrap();
        assert_eq!(
            v3.term("Interface").map(|id| id.as_str()),
            Some("dtmi:dtdl:class:Interface;3")
        );
        assert_eq!(v3.prefix("dtdl"), Some("dtmi:dtdl:"));
    }

    #[test]
    fn endogenous_families_present() {
        assert!(ENDOGENOUS_CONTEXT_HISTORIES.contains_key("dtmi:dtdl:extension:quantitativeTypes"));
        let mqtt = &ENDOGENOUS_CONTEXT_HISTORIES["dtmi:dtdl:extension:mqtt"];
        assert_eq!(mqtt.available_versions().len(), 2);
        assert!(mqtt.is_term_reserved("ttl"));
    }

    #[test]
    fn recognizes_dtdl_context_specifiers() {
        assert!(is_dtdl_context_specifier("dtmi:dtdl:context;3"));
        assert!(is_dtdl_context_specifier("dtmi:dtdl:context"));
        assert!(is_dtdl_context_specifier("dtmi:dtdl:context#frag"));
        assert!(!is_dtdl_context_specifier("dtmi:dtdl:contexts;3"));
        assert!(!is_dtdl_context_specifier("dtmi:dtdl:extension:mqtt;1"));
    }
}
