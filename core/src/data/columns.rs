//! Column names of the INEP datasets

/// School code, the ENEM/IDEB join key
pub const SCHOOL_CODE: &str = "CO_ESCOLA";
pub const AGE: &str = "NU_IDADE";
pub const MARITAL_STATUS: &str = "TP_ESTADO_CIVIL";
pub const SCHOOLING_TYPE: &str = "TP_ENSINO";
pub const STATE_OF_RESIDENCE: &str = "SG_UF_RESIDENCIA";
/// Household size
pub const HOUSEHOLD_SIZE: &str = "Q005";

/// Mean of the five area scores
pub const TOTAL_SCORE: &str = "NU_NOTA_TOT";

pub const SCORE_COLUMNS: [&str; 5] = [
    "NU_NOTA_CN",
    "NU_NOTA_CH",
    "NU_NOTA_LC",
    "NU_NOTA_MT",
    "NU_NOTA_REDACAO",
];

pub const PASS_RATE: &str = "IN_RENDIMENTO";
pub const STANDARDIZED_SCORE: &str = "NT_PADRONIZADA";
pub const IDEB: &str = "IDEB";

/// Columns kept as floats after the merge; everything else is categorical
pub const NUMERIC_COLUMNS: [&str; 4] = [AGE, TOTAL_SCORE, PASS_RATE, HOUSEHOLD_SIZE];

/// ENEM columns every run needs, besides the score columns
pub const REQUIRED_ENEM_COLUMNS: [&str; 6] = [
    SCHOOL_CODE,
    AGE,
    MARITAL_STATUS,
    SCHOOLING_TYPE,
    STATE_OF_RESIDENCE,
    HOUSEHOLD_SIZE,
];

pub fn is_numeric(column: &str) -> bool {
    NUMERIC_COLUMNS.contains(&column)
}
