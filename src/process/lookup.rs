// src/process/lookup.rs

use std::collections::BTreeMap;
use std::fmt;

/// Target columns of the `entretien` table that are read from a sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Mode,
    Duree,
    Sexe,
    Age,
    VientPr,
    SitFam,
    Enfant,
    ModeleFam,
    Profession,
    Ress,
    Origine,
    Commune,
    Partenaire,
}

/// How a field's value is constrained once normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Small integer code, `^[0-9]+$`.
    Integer,
    /// Integer optionally followed by one letter, e.g. `5c`.
    ShortCode,
    /// Free text, truncated to the configured limit.
    Text,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Mode,
        Field::Duree,
        Field::Sexe,
        Field::Age,
        Field::VientPr,
        Field::SitFam,
        Field::Enfant,
        Field::ModeleFam,
        Field::Profession,
        Field::Ress,
        Field::Origine,
        Field::Commune,
        Field::Partenaire,
    ];

    /// Canonical upper-case name, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Mode => "MODE",
            Field::Duree => "DUREE",
            Field::Sexe => "SEXE",
            Field::Age => "AGE",
            Field::VientPr => "VIENT_PR",
            Field::SitFam => "SIT_FAM",
            Field::Enfant => "ENFANT",
            Field::ModeleFam => "MODELE_FAM",
            Field::Profession => "PROFESSION",
            Field::Ress => "RESS",
            Field::Origine => "ORIGINE",
            Field::Commune => "COMMUNE",
            Field::Partenaire => "PARTENAIRE",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::SitFam => FieldKind::ShortCode,
            Field::Commune | Field::Partenaire => FieldKind::Text,
            _ => FieldKind::Integer,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header spellings seen across the monthly sheets, tried in order.
static DEFAULT_ALIASES: &[(Field, &[&str])] = &[
    (Field::Mode, &["Mode"]),
    (Field::Duree, &["Durée", "Duree", "Durée entretien"]),
    (Field::Sexe, &["Sexe"]),
    (Field::Age, &["Age", "Âge", "Tranche d'âge"]),
    (Field::VientPr, &["Vient pr", "Vient pour", "Vient_pr"]),
    (
        Field::SitFam,
        &["Sit° Fam", "Sit° fam.", "Situation Familiale", "Sit. Fam."],
    ),
    (Field::Enfant, &["Enfants", "Enfant", "Nb enfants", "Nbre enfants"]),
    (
        Field::ModeleFam,
        &["Modèle fam.", "Modèle Fam", "Modèle familial", "Modele familial"],
    ),
    (Field::Profession, &["Profession", "Prof.", "Activité"]),
    (Field::Ress, &["Ressources", "Ress.", "Ress"]),
    (Field::Origine, &["Origine", "Orienté par", "Origine orientation"]),
    (Field::Commune, &["Domicile", "Commune", "Commune de résidence"]),
    (
        Field::Partenaire,
        &["Partenaire", "Partenaires", "Orientation partenaire"],
    ),
];

/// Hand-curated spreadsheet label → code table.
static DEFAULT_VALUE_CODES: &[(Field, &[(&str, &str)])] = &[
    (
        Field::Mode,
        &[
            ("RDV", "1"),
            ("Sur RDV", "1"),
            ("Sans RDV", "2"),
            ("Téléphone", "3"),
            ("Tél.", "3"),
            ("Courrier", "4"),
            ("Mail", "5"),
            ("Courriel", "5"),
        ],
    ),
    (
        Field::Duree,
        &[
            ("-15 min", "1"),
            ("15-30 min", "2"),
            ("30-45 min", "3"),
            ("45-60 min", "4"),
            ("+60 min", "5"),
        ],
    ),
    (
        Field::Sexe,
        &[
            ("Homme", "1"),
            ("H", "1"),
            ("Femme", "2"),
            ("F", "2"),
            ("Couple", "3"),
            ("Professionnel", "4"),
        ],
    ),
    (
        Field::Age,
        &[
            ("-18 ans", "1"),
            ("18-25 ans", "2"),
            ("26-40 ans", "3"),
            ("41-60 ans", "4"),
            ("+60 ans", "5"),
            ("61 ans et +", "5"),
        ],
    ),
    (
        Field::VientPr,
        &[
            ("Soi", "1"),
            ("Soi-même", "1"),
            ("Conjoint", "2"),
            ("Parent", "3"),
            ("Enfant", "4"),
            ("Tiers", "5"),
        ],
    ),
    (
        Field::SitFam,
        &[
            ("Célibataire", "1"),
            ("Concubin", "2"),
            ("Pacsé", "3"),
            ("Marié", "4"),
            ("Séparé", "5a"),
            ("Divorcé", "5b"),
            ("Sép./div. en cours", "5c"),
            ("Veuf", "6"),
        ],
    ),
    (Field::Enfant, &[("Sans", "0"), ("Aucun", "0")]),
    (
        Field::ModeleFam,
        &[
            ("Couple avec enfant", "1"),
            ("Couple sans enfant", "2"),
            ("Parisolé", "3"),
            ("Parent isolé", "3"),
            ("Personne seule", "4"),
            ("Fam. recomposée", "5"),
        ],
    ),
    (
        Field::Profession,
        &[
            ("Agriculteur", "1"),
            ("Artisan", "2"),
            ("Commerçant", "2"),
            ("Cadre", "3"),
            ("Prof. intermédiaire", "4"),
            ("Employé", "5"),
            ("Ouvrier", "6"),
            ("Retraité", "7"),
            ("Sans emploi", "8"),
            ("Etudiant", "9"),
            ("Étudiant", "9"),
        ],
    ),
    (
        Field::Ress,
        &[
            ("Salaire", "1"),
            ("Revenus pro.", "2"),
            ("Retraite", "3"),
            ("Chômage", "4"),
            ("RSA", "5"),
            ("AAH", "6"),
            ("Sans ressources", "7"),
        ],
    ),
    (
        Field::Origine,
        &[
            ("Connaissance", "1"),
            ("Mairie", "2"),
            ("Tribunal", "3"),
            ("Travailleur social", "4"),
            ("Avocat", "5"),
            ("Internet", "6"),
            ("Presse", "7"),
            ("Déjà venu", "8"),
        ],
    ),
];

pub fn default_field_aliases() -> BTreeMap<String, Vec<String>> {
    DEFAULT_ALIASES
        .iter()
        .map(|(field, names)| {
            (
                field.name().to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}

pub fn default_value_codes() -> BTreeMap<String, BTreeMap<String, String>> {
    DEFAULT_VALUE_CODES
        .iter()
        .map(|(field, pairs)| {
            (
                field.name().to_string(),
                pairs
                    .iter()
                    .map(|(label, code)| (label.to_string(), code.to_string()))
                    .collect(),
            )
        })
        .collect()
}
