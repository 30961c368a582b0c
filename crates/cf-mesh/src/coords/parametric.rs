//! Parametric vertical coordinates.
//!
//! A vertical coordinate whose `standard_name` names one of the CF
//! parametric formulas carries a `formula_terms` attribute such as
//! `"s: s_rho C: Cs_r eta: zeta depth: h depth_c: hc"`. Each term names a
//! dataset variable. Generation goes through three steps:
//!
//! 1. **Lookup**: match the `standard_name` against [`FormulaKind`].
//! 2. **Bind**: parse the terms, resolve every variable and pick the formula
//!    variant from the keys present ([`VerticalFormula`]).
//! 3. **Evaluate**: `(n, k, j, i) -> z`, then `bias + scale * z`.
//!
//! Terms indexed by `(n, j, i)` or `(j, i)` are right-aligned against their
//! stored dimensions, so a surface pressure without a time axis is read as
//! `ps[j, i]`.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArcArray, IxDyn};

use mesh_common::{Dataset, MeshError, MeshResult};

/// Formulas selectable by `standard_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaKind {
    AtmosphereLnPressure,
    AtmosphereSigma,
    AtmosphereHybridSigmaPressure,
    AtmosphereHybridHeight,
    AtmosphereSleve,
    OceanSigma,
    OceanS,
    OceanSGenericForm1,
    OceanSGenericForm2,
    OceanSigmaZ,
    OceanDoubleSigma,
}

impl FormulaKind {
    pub const ALL: [FormulaKind; 11] = [
        FormulaKind::AtmosphereLnPressure,
        FormulaKind::AtmosphereSigma,
        FormulaKind::AtmosphereHybridSigmaPressure,
        FormulaKind::AtmosphereHybridHeight,
        FormulaKind::AtmosphereSleve,
        FormulaKind::OceanSigma,
        FormulaKind::OceanS,
        FormulaKind::OceanSGenericForm1,
        FormulaKind::OceanSGenericForm2,
        FormulaKind::OceanSigmaZ,
        FormulaKind::OceanDoubleSigma,
    ];

    pub fn standard_name(&self) -> &'static str {
        match self {
            FormulaKind::AtmosphereLnPressure => "atmosphere_ln_pressure_coordinate",
            FormulaKind::AtmosphereSigma => "atmosphere_sigma_coordinate",
            FormulaKind::AtmosphereHybridSigmaPressure => {
                "atmosphere_hybrid_sigma_pressure_coordinate"
            }
            FormulaKind::AtmosphereHybridHeight => "atmosphere_hybrid_height_coordinate",
            FormulaKind::AtmosphereSleve => "atmosphere_sleve_coordinate",
            FormulaKind::OceanSigma => "ocean_sigma_coordinate",
            FormulaKind::OceanS => "ocean_s_coordinate",
            FormulaKind::OceanSGenericForm1 => "ocean_s_coordinate_g1",
            FormulaKind::OceanSGenericForm2 => "ocean_s_coordinate_g2",
            FormulaKind::OceanSigmaZ => "ocean_sigma_z_coordinate",
            FormulaKind::OceanDoubleSigma => "ocean_double_sigma_coordinate",
        }
    }

    pub fn from_standard_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.standard_name() == name)
    }

    /// Standard name of the quantity the formula computes.
    pub fn computed_standard_name(&self) -> &'static str {
        match self {
            FormulaKind::AtmosphereLnPressure
            | FormulaKind::AtmosphereSigma
            | FormulaKind::AtmosphereHybridSigmaPressure => "air_pressure",
            _ => "altitude",
        }
    }
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}

/// Parsed `formula_terms` attribute: ordered `key -> variable` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaTerms(Vec<(String, String)>);

impl FormulaTerms {
    /// Parse a space-separated `key: variable` sequence.
    ///
    /// An odd token count, or a key without its trailing colon, is rejected.
    pub fn parse(text: &str) -> MeshResult<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(MeshError::InvalidFormulaTerms(format!("{:?}", tokens)));
        }

        let mut pairs = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks(2) {
            let key = pair[0].strip_suffix(':').ok_or_else(|| {
                MeshError::InvalidFormulaTerms(format!("expected 'key:' but found '{}'", pair[0]))
            })?;
            pairs.push((key.to_string(), pair[1].to_string()));
        }
        Ok(Self(pairs))
    }

    /// Variable bound to a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for FormulaTerms {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which of `(n, k, j, i)` an array term is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPattern {
    K,
    Ji,
    Nji,
}

impl IndexPattern {
    fn rank(&self) -> usize {
        match self {
            IndexPattern::K => 1,
            IndexPattern::Ji => 2,
            IndexPattern::Nji => 3,
        }
    }
}

/// An array term bound to a dataset variable.
#[derive(Debug, Clone)]
pub struct Term {
    key: String,
    variable: String,
    pattern: IndexPattern,
    data: ArcArray<f64, IxDyn>,
}

impl Term {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Value at the trailing indices matching the stored rank.
    #[inline]
    fn at(&self, index: &[usize]) -> f64 {
        let offset = index.len() - self.data.ndim();
        self.data[&index[offset..]]
    }

    #[inline]
    fn k(&self, k: usize) -> f64 {
        self.at(&[k])
    }

    #[inline]
    fn ji(&self, j: usize, i: usize) -> f64 {
        self.at(&[j, i])
    }

    #[inline]
    fn nji(&self, n: usize, j: usize, i: usize) -> f64 {
        self.at(&[n, j, i])
    }

    /// Check that every index evaluation can reach lies inside the array.
    fn check_extent(&self, formula: FormulaKind, extent: &FormulaExtent) -> MeshResult<()> {
        let required = match self.pattern {
            IndexPattern::K => vec![extent.k],
            IndexPattern::Ji => vec![extent.j, extent.i],
            IndexPattern::Nji => vec![extent.n, extent.j, extent.i],
        };
        for (size, needed) in self.data.shape().iter().rev().zip(required.iter().rev()) {
            if size < needed {
                return Err(MeshError::formula_binding(
                    formula.standard_name(),
                    format!(
                        "term '{}' ({}) has shape {:?}, too small for {} samples",
                        self.key,
                        self.variable,
                        self.data.shape(),
                        needed
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Number of samples reached along each of `(n, k, j, i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaExtent {
    pub n: usize,
    pub k: usize,
    pub j: usize,
    pub i: usize,
}

/// `atmosphere_hybrid_sigma_pressure_coordinate` variants.
#[derive(Debug, Clone)]
pub enum HybridSigmaPressure {
    /// `p = a(k) * p0 + b(k) * ps(n,j,i)`
    P0Form { a: Term, b: Term, p0: f64, ps: Term },
    /// `p = ap(k) + b(k) * ps(n,j,i)`
    ApForm { ap: Term, b: Term, ps: Term },
}

/// `ocean_sigma_z_coordinate` variants.
#[derive(Debug, Clone)]
pub enum OceanSigmaZ {
    /// `z = eta(n,j,i) + sigma(k) * (min(depth_c, depth(j,i)) + eta(n,j,i))`
    SigmaForm {
        sigma: Term,
        eta: Term,
        depth: Term,
        depth_c: f64,
    },
    /// `z = zlev(k)`
    ZLevForm { zlev: Term },
}

/// A bound parametric formula.
#[derive(Debug, Clone)]
pub enum VerticalFormula {
    /// `p = p0 * exp(-lev(k))`
    LnPressure { p0: f64, lev: Term },
    /// `p = ptop + sigma(k) * (ps(n,j,i) - ptop)`
    Sigma { ptop: f64, sigma: Term, ps: Term },
    HybridSigmaPressure(HybridSigmaPressure),
    /// `z = a(k) + b(k) * orog(n,j,i)`
    HybridHeight { a: Term, b: Term, orog: Term },
    /// `z = a(k) * ztop + b1(k) * zsurf1(n,j,i) + b2(k) * zsurf2(n,j,i)`
    Sleve {
        a: Term,
        b1: Term,
        b2: Term,
        ztop: f64,
        zsurf1: Term,
        zsurf2: Term,
    },
    /// `z = eta(n,j,i) + sigma(k) * (depth(j,i) + eta(n,j,i))`
    OceanSigma { sigma: Term, eta: Term, depth: Term },
    OceanS {
        s: Term,
        eta: Term,
        depth: Term,
        a: f64,
        b: f64,
        depth_c: f64,
    },
    OceanSGenericForm1 {
        s: Term,
        c: Term,
        eta: Term,
        depth: Term,
        depth_c: f64,
    },
    OceanSGenericForm2 {
        s: Term,
        c: Term,
        eta: Term,
        depth: Term,
        depth_c: f64,
    },
    OceanSigmaZ(OceanSigmaZ),
    /// Piecewise at `k_c`.
    OceanDoubleSigma {
        sigma: Term,
        depth: Term,
        z1: f64,
        z2: f64,
        a: f64,
        href: f64,
        k_c: f64,
    },
}

/// Resolves the terms of one formula against a dataset.
struct TermBinder<'a> {
    kind: FormulaKind,
    dataset: &'a Dataset,
    terms: &'a FormulaTerms,
}

impl TermBinder<'_> {
    fn has(&self, key: &str) -> bool {
        self.terms.contains(key)
    }

    fn variable_name(&self, key: &str) -> MeshResult<&str> {
        self.terms.get(key).ok_or_else(|| {
            MeshError::formula_binding(
                self.kind.standard_name(),
                format!("missing term '{}' in {:?}", key, self.terms),
            )
        })
    }

    fn array(&self, key: &str, pattern: IndexPattern) -> MeshResult<Term> {
        let name = self.variable_name(key)?;
        let variable = self.dataset.variable(name)?;
        if variable.ndim() > pattern.rank() {
            return Err(MeshError::formula_binding(
                self.kind.standard_name(),
                format!(
                    "term '{}' ({}) has {} dimensions, at most {} expected",
                    key,
                    name,
                    variable.ndim(),
                    pattern.rank()
                ),
            ));
        }
        Ok(Term {
            key: key.to_string(),
            variable: name.to_string(),
            pattern,
            data: variable.data().clone(),
        })
    }

    fn scalar(&self, key: &str) -> MeshResult<f64> {
        let name = self.variable_name(key)?;
        let variable = self.dataset.variable(name)?;
        match (variable.size(), variable.first_value()) {
            (1, Some(value)) => Ok(value),
            _ => Err(MeshError::formula_binding(
                self.kind.standard_name(),
                format!(
                    "term '{}' ({}) must be a scalar, found shape {:?}",
                    key,
                    name,
                    variable.shape()
                ),
            )),
        }
    }
}

impl VerticalFormula {
    /// Bind the terms of a formula. Variants are chosen here, once.
    pub fn bind(kind: FormulaKind, dataset: &Dataset, terms: &FormulaTerms) -> MeshResult<Self> {
        use IndexPattern::{Ji, Nji, K};

        let t = TermBinder {
            kind,
            dataset,
            terms,
        };

        let formula = match kind {
            FormulaKind::AtmosphereLnPressure => VerticalFormula::LnPressure {
                p0: t.scalar("p0")?,
                lev: t.array("lev", K)?,
            },
            FormulaKind::AtmosphereSigma => VerticalFormula::Sigma {
                ptop: t.scalar("ptop")?,
                sigma: t.array("sigma", K)?,
                ps: t.array("ps", Nji)?,
            },
            FormulaKind::AtmosphereHybridSigmaPressure => {
                let variant = if t.has("p0") {
                    HybridSigmaPressure::P0Form {
                        a: t.array("a", K)?,
                        b: t.array("b", K)?,
                        p0: t.scalar("p0")?,
                        ps: t.array("ps", Nji)?,
                    }
                } else {
                    HybridSigmaPressure::ApForm {
                        ap: t.array("ap", K)?,
                        b: t.array("b", K)?,
                        ps: t.array("ps", Nji)?,
                    }
                };
                VerticalFormula::HybridSigmaPressure(variant)
            }
            FormulaKind::AtmosphereHybridHeight => VerticalFormula::HybridHeight {
                a: t.array("a", K)?,
                b: t.array("b", K)?,
                orog: t.array("orog", Nji)?,
            },
            FormulaKind::AtmosphereSleve => VerticalFormula::Sleve {
                a: t.array("a", K)?,
                b1: t.array("b1", K)?,
                b2: t.array("b2", K)?,
                ztop: t.scalar("ztop")?,
                zsurf1: t.array("zsurf1", Nji)?,
                zsurf2: t.array("zsurf2", Nji)?,
            },
            FormulaKind::OceanSigma => VerticalFormula::OceanSigma {
                sigma: t.array("sigma", K)?,
                eta: t.array("eta", Nji)?,
                depth: t.array("depth", Ji)?,
            },
            FormulaKind::OceanS => VerticalFormula::OceanS {
                s: t.array("s", K)?,
                eta: t.array("eta", Nji)?,
                depth: t.array("depth", Ji)?,
                a: t.scalar("a")?,
                b: t.scalar("b")?,
                depth_c: t.scalar("depth_c")?,
            },
            FormulaKind::OceanSGenericForm1 => VerticalFormula::OceanSGenericForm1 {
                s: t.array("s", K)?,
                c: t.array("C", K)?,
                eta: t.array("eta", Nji)?,
                depth: t.array("depth", Ji)?,
                depth_c: t.scalar("depth_c")?,
            },
            FormulaKind::OceanSGenericForm2 => VerticalFormula::OceanSGenericForm2 {
                s: t.array("s", K)?,
                c: t.array("C", K)?,
                eta: t.array("eta", Nji)?,
                depth: t.array("depth", Ji)?,
                depth_c: t.scalar("depth_c")?,
            },
            FormulaKind::OceanSigmaZ => {
                let variant = if t.has("zlev") {
                    OceanSigmaZ::ZLevForm {
                        zlev: t.array("zlev", K)?,
                    }
                } else if t.has("sigma") {
                    OceanSigmaZ::SigmaForm {
                        sigma: t.array("sigma", K)?,
                        eta: t.array("eta", Nji)?,
                        depth: t.array("depth", Ji)?,
                        depth_c: t.scalar("depth_c")?,
                    }
                } else {
                    return Err(MeshError::formula_binding(
                        kind.standard_name(),
                        format!("neither 'sigma' nor 'zlev' in {:?}", terms),
                    ));
                };
                VerticalFormula::OceanSigmaZ(variant)
            }
            FormulaKind::OceanDoubleSigma => VerticalFormula::OceanDoubleSigma {
                sigma: t.array("sigma", K)?,
                depth: t.array("depth", Ji)?,
                z1: t.scalar("z1")?,
                z2: t.scalar("z2")?,
                a: t.scalar("a")?,
                href: t.scalar("href")?,
                k_c: t.scalar("k_c")?,
            },
        };

        Ok(formula)
    }

    pub fn kind(&self) -> FormulaKind {
        match self {
            VerticalFormula::LnPressure { .. } => FormulaKind::AtmosphereLnPressure,
            VerticalFormula::Sigma { .. } => FormulaKind::AtmosphereSigma,
            VerticalFormula::HybridSigmaPressure(_) => FormulaKind::AtmosphereHybridSigmaPressure,
            VerticalFormula::HybridHeight { .. } => FormulaKind::AtmosphereHybridHeight,
            VerticalFormula::Sleve { .. } => FormulaKind::AtmosphereSleve,
            VerticalFormula::OceanSigma { .. } => FormulaKind::OceanSigma,
            VerticalFormula::OceanS { .. } => FormulaKind::OceanS,
            VerticalFormula::OceanSGenericForm1 { .. } => FormulaKind::OceanSGenericForm1,
            VerticalFormula::OceanSGenericForm2 { .. } => FormulaKind::OceanSGenericForm2,
            VerticalFormula::OceanSigmaZ(_) => FormulaKind::OceanSigmaZ,
            VerticalFormula::OceanDoubleSigma { .. } => FormulaKind::OceanDoubleSigma,
        }
    }

    /// Raw vertical value at `(n, k, j, i)`.
    ///
    /// Panics if an index lies outside a bound term; see [`Self::check_extent`].
    pub fn evaluate(&self, n: usize, k: usize, j: usize, i: usize) -> f64 {
        match self {
            VerticalFormula::LnPressure { p0, lev } => p0 * (-lev.k(k)).exp(),
            VerticalFormula::Sigma { ptop, sigma, ps } => {
                ptop + sigma.k(k) * (ps.nji(n, j, i) - ptop)
            }
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::P0Form { a, b, p0, ps }) => {
                a.k(k) * p0 + b.k(k) * ps.nji(n, j, i)
            }
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::ApForm { ap, b, ps }) => {
                ap.k(k) + b.k(k) * ps.nji(n, j, i)
            }
            VerticalFormula::HybridHeight { a, b, orog } => a.k(k) + b.k(k) * orog.nji(n, j, i),
            VerticalFormula::Sleve {
                a,
                b1,
                b2,
                ztop,
                zsurf1,
                zsurf2,
            } => a.k(k) * ztop + b1.k(k) * zsurf1.nji(n, j, i) + b2.k(k) * zsurf2.nji(n, j, i),
            VerticalFormula::OceanSigma { sigma, eta, depth } => {
                let eta = eta.nji(n, j, i);
                eta + sigma.k(k) * (depth.ji(j, i) + eta)
            }
            VerticalFormula::OceanS {
                s,
                eta,
                depth,
                a,
                b,
                depth_c,
            } => {
                let s = s.k(k);
                let c = (1.0 - b) * (a * s).sinh() / a.sinh()
                    + b * ((a * (s + 0.5)).tanh() / (2.0 * (0.5 * a).tanh()) - 0.5);
                eta.nji(n, j, i) * (1.0 + s) + depth_c * s + (depth.ji(j, i) - depth_c) * c
            }
            VerticalFormula::OceanSGenericForm1 {
                s,
                c,
                eta,
                depth,
                depth_c,
            } => {
                let depth = depth.ji(j, i);
                let s_kji = depth_c * s.k(k) + (depth - depth_c) * c.k(k);
                s_kji + eta.nji(n, j, i) * (1.0 + s_kji / depth)
            }
            VerticalFormula::OceanSGenericForm2 {
                s,
                c,
                eta,
                depth,
                depth_c,
            } => {
                let depth = depth.ji(j, i);
                let eta = eta.nji(n, j, i);
                let s_kji = (depth_c * s.k(k) + depth * c.k(k)) / (depth_c + depth);
                eta + (eta + depth) * s_kji
            }
            VerticalFormula::OceanSigmaZ(OceanSigmaZ::SigmaForm {
                sigma,
                eta,
                depth,
                depth_c,
            }) => {
                let eta = eta.nji(n, j, i);
                eta + sigma.k(k) * (depth_c.min(depth.ji(j, i)) + eta)
            }
            VerticalFormula::OceanSigmaZ(OceanSigmaZ::ZLevForm { zlev }) => zlev.k(k),
            VerticalFormula::OceanDoubleSigma {
                sigma,
                depth,
                z1,
                z2,
                a,
                href,
                k_c,
            } => {
                let depth = depth.ji(j, i);
                let f = 0.5 * (z1 + z2)
                    + 0.5 * (z1 - z2) * (2.0 * a / (z1 - z2) * (depth - href)).tanh();
                if k as f64 <= *k_c {
                    sigma.k(k) * f
                } else {
                    f + (sigma.k(k) - 1.0) * (depth - f)
                }
            }
        }
    }

    /// Every array term of the bound variant.
    pub fn terms(&self) -> Vec<&Term> {
        match self {
            VerticalFormula::LnPressure { lev, .. } => vec![lev],
            VerticalFormula::Sigma { sigma, ps, .. } => vec![sigma, ps],
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::P0Form { a, b, ps, .. }) => {
                vec![a, b, ps]
            }
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::ApForm { ap, b, ps }) => {
                vec![ap, b, ps]
            }
            VerticalFormula::HybridHeight { a, b, orog } => vec![a, b, orog],
            VerticalFormula::Sleve {
                a,
                b1,
                b2,
                zsurf1,
                zsurf2,
                ..
            } => vec![a, b1, b2, zsurf1, zsurf2],
            VerticalFormula::OceanSigma { sigma, eta, depth } => vec![sigma, eta, depth],
            VerticalFormula::OceanS { s, eta, depth, .. } => vec![s, eta, depth],
            VerticalFormula::OceanSGenericForm1 {
                s, c, eta, depth, ..
            }
            | VerticalFormula::OceanSGenericForm2 {
                s, c, eta, depth, ..
            } => vec![s, c, eta, depth],
            VerticalFormula::OceanSigmaZ(OceanSigmaZ::SigmaForm {
                sigma, eta, depth, ..
            }) => vec![sigma, eta, depth],
            VerticalFormula::OceanSigmaZ(OceanSigmaZ::ZLevForm { zlev }) => vec![zlev],
            VerticalFormula::OceanDoubleSigma { sigma, depth, .. } => vec![sigma, depth],
        }
    }

    /// Fail unless every term covers the given number of samples along each
    /// index it uses.
    pub fn check_extent(&self, extent: &FormulaExtent) -> MeshResult<()> {
        let kind = self.kind();
        self.terms()
            .into_iter()
            .try_for_each(|term| term.check_extent(kind, extent))
    }
}

/// A bound formula with the vertical bias/scale post-transform.
#[derive(Debug, Clone)]
pub struct ParametricFormula {
    formula: VerticalFormula,
    bias: f64,
    scale: f64,
}

impl ParametricFormula {
    pub fn new(formula: VerticalFormula, bias: f64, scale: f64) -> Self {
        Self {
            formula,
            bias,
            scale,
        }
    }

    /// Formula for the vertical coordinate variable `name`.
    ///
    /// `Ok(None)` when its `standard_name` is not a parametric formula, in
    /// which case the coordinate values are used directly.
    pub fn lookup(
        dataset: &Dataset,
        name: &str,
        bias: f64,
        scale: f64,
    ) -> MeshResult<Option<Self>> {
        let variable = dataset.variable(name)?;
        let kind = match variable
            .attr_str("standard_name")
            .and_then(FormulaKind::from_standard_name)
        {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let text = variable.attr_str("formula_terms").ok_or_else(|| {
            MeshError::formula_binding(
                kind.standard_name(),
                format!("'{}' has no formula_terms attribute", name),
            )
        })?;
        let terms = FormulaTerms::parse(text)?;
        let formula = VerticalFormula::bind(kind, dataset, &terms)?;

        tracing::debug!(
            coordinate = %name,
            formula = %kind,
            terms = terms.len(),
            "Bound parametric vertical formula"
        );

        Ok(Some(Self::new(formula, bias, scale)))
    }

    pub fn formula(&self) -> &VerticalFormula {
        &self.formula
    }

    pub fn kind(&self) -> FormulaKind {
        self.formula.kind()
    }

    /// `bias + scale * formula(n, k, j, i)`.
    #[inline]
    pub fn evaluate(&self, n: usize, k: usize, j: usize, i: usize) -> f64 {
        self.bias + self.scale * self.formula.evaluate(n, k, j, i)
    }

    pub fn check_extent(&self, extent: &FormulaExtent) -> MeshResult<()> {
        self.formula.check_extent(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_common::Variable;
    use ndarray::{ArrayD, Dimension, IxDyn};

    const EPS: f64 = 1e-9;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn grid(name: &str, dim_names: &[&str], shape: &[usize], f: impl Fn(&[usize]) -> f64) -> Variable {
        let data = ArrayD::from_shape_fn(IxDyn(shape), |ix| f(ix.slice()));
        Variable::new(name, dims(dim_names), data).unwrap()
    }

    #[test]
    fn test_parse_formula_terms() {
        let terms = FormulaTerms::parse("s: s_rho C: Cs_r  eta: zeta").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms.get("C"), Some("Cs_r"));
        assert_eq!(terms.get("eta"), Some("zeta"));
        assert!(!terms.contains("depth"));

        let err = FormulaTerms::parse("s: s_rho C:").unwrap_err();
        assert!(matches!(err, MeshError::InvalidFormulaTerms(_)));
        assert!("s s_rho".parse::<FormulaTerms>().is_err());
    }

    #[test]
    fn test_kind_lookup() {
        for kind in FormulaKind::ALL {
            assert_eq!(FormulaKind::from_standard_name(kind.standard_name()), Some(kind));
        }
        assert_eq!(FormulaKind::from_standard_name("depth"), None);
        assert_eq!(FormulaKind::AtmosphereSigma.computed_standard_name(), "air_pressure");
    }

    fn ocean() -> Dataset {
        Dataset::new()
            .with_coord(Variable::coordinate("s_rho", vec![-0.75, -0.25]))
            .unwrap()
            .with_data_var(Variable::new("Cs_r", dims(&["s_rho"]), ArrayD::from_shape_vec(IxDyn(&[2]), vec![-0.5, -0.1]).unwrap()).unwrap())
            .unwrap()
            .with_data_var(grid("zeta", &["ocean_time", "eta_rho", "xi_rho"], &[2, 2, 3], |ix| {
                0.1 * ix[0] as f64 + 0.01 * ix[2] as f64
            }))
            .unwrap()
            .with_data_var(grid("h", &["eta_rho", "xi_rho"], &[2, 3], |ix| {
                100.0 + 10.0 * ix[0] as f64 + ix[1] as f64
            }))
            .unwrap()
            .with_data_var(Variable::scalar("hc", 20.0))
            .unwrap()
            .with_data_var(Variable::coordinate("zlev", vec![-5.0, -15.0]).with_attr("units", "m"))
            .unwrap()
    }

    #[test]
    fn test_ocean_s_g2() {
        let ds = ocean();
        let terms = FormulaTerms::parse("s: s_rho C: Cs_r eta: zeta depth: h depth_c: hc").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSGenericForm2, &ds, &terms).unwrap();

        let (n, k, j, i) = (1, 0, 1, 2);
        let depth = 112.0;
        let eta = 0.1 + 0.02;
        let s = (20.0 * -0.75 + depth * -0.5) / (20.0 + depth);
        let expected = eta + (eta + depth) * s;
        assert!((formula.evaluate(n, k, j, i) - expected).abs() < EPS);
    }

    #[test]
    fn test_ocean_s_g1_uses_computed_s() {
        let ds = ocean();
        let terms = FormulaTerms::parse("s: s_rho C: Cs_r eta: zeta depth: h depth_c: hc").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSGenericForm1, &ds, &terms).unwrap();

        let depth = 100.0;
        let eta = 0.0;
        let s_kji = 20.0 * -0.25 + (depth - 20.0) * -0.1;
        let expected = s_kji + eta * (1.0 + s_kji / depth);
        assert!((formula.evaluate(0, 1, 0, 0) - expected).abs() < EPS);
    }

    #[test]
    fn test_sigma_z_dispatch() {
        let ds = ocean()
            .with_coord(Variable::coordinate("sig", vec![-0.5, -1.0]))
            .unwrap();

        let sigma_terms = FormulaTerms::parse("sigma: sig eta: zeta depth: h depth_c: hc").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSigmaZ, &ds, &sigma_terms).unwrap();
        assert!(matches!(formula, VerticalFormula::OceanSigmaZ(OceanSigmaZ::SigmaForm { .. })));
        // min(depth_c, depth) = 20, eta = 0
        assert!((formula.evaluate(0, 1, 0, 0) - -20.0).abs() < EPS);

        let zlev_terms = FormulaTerms::parse("zlev: zlev").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSigmaZ, &ds, &zlev_terms).unwrap();
        assert!(matches!(formula, VerticalFormula::OceanSigmaZ(OceanSigmaZ::ZLevForm { .. })));
        assert_eq!(formula.evaluate(0, 1, 0, 0), -15.0);

        let neither = FormulaTerms::parse("eta: zeta depth: h").unwrap();
        let err = VerticalFormula::bind(FormulaKind::OceanSigmaZ, &ds, &neither).unwrap_err();
        assert!(matches!(err, MeshError::FormulaBinding { .. }));
    }

    #[test]
    fn test_hybrid_sigma_pressure_variants() {
        let ds = Dataset::new()
            .with_coord(Variable::coordinate("lev", vec![0.0, 1.0]))
            .unwrap()
            .with_data_var(Variable::new("hyam", dims(&["lev"]), ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.1, 0.2]).unwrap()).unwrap())
            .unwrap()
            .with_data_var(Variable::new("hybm", dims(&["lev"]), ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.5, 0.9]).unwrap()).unwrap())
            .unwrap()
            .with_data_var(Variable::scalar("P0", 1000.0))
            .unwrap()
            .with_data_var(grid("PS", &["lat", "lon"], &[1, 2], |ix| 900.0 + ix[1] as f64))
            .unwrap();

        let p0_terms = FormulaTerms::parse("a: hyam b: hybm p0: P0 ps: PS").unwrap();
        let formula =
            VerticalFormula::bind(FormulaKind::AtmosphereHybridSigmaPressure, &ds, &p0_terms).unwrap();
        assert!(matches!(
            formula,
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::P0Form { .. })
        ));
        // ps has no time axis: read as ps[j, i]
        assert!((formula.evaluate(3, 1, 0, 1) - (0.2 * 1000.0 + 0.9 * 901.0)).abs() < EPS);

        let ap_terms = FormulaTerms::parse("ap: hyam b: hybm ps: PS").unwrap();
        let formula =
            VerticalFormula::bind(FormulaKind::AtmosphereHybridSigmaPressure, &ds, &ap_terms).unwrap();
        assert!(matches!(
            formula,
            VerticalFormula::HybridSigmaPressure(HybridSigmaPressure::ApForm { .. })
        ));
        assert!((formula.evaluate(0, 0, 0, 0) - (0.1 + 0.5 * 900.0)).abs() < EPS);
    }

    #[test]
    fn test_ln_pressure_and_double_sigma() {
        let ds = ocean()
            .with_data_var(Variable::scalar("p0", 1000.0))
            .unwrap()
            .with_data_var(Variable::scalar("kc", 0.0))
            .unwrap()
            .with_data_var(Variable::scalar("z1", -10.0))
            .unwrap()
            .with_data_var(Variable::scalar("z2", -50.0))
            .unwrap()
            .with_data_var(Variable::scalar("alpha", 1.0))
            .unwrap()
            .with_data_var(Variable::scalar("href", 100.0))
            .unwrap();

        let ln = VerticalFormula::bind(
            FormulaKind::AtmosphereLnPressure,
            &ds,
            &FormulaTerms::parse("p0: p0 lev: s_rho").unwrap(),
        )
        .unwrap();
        assert!((ln.evaluate(0, 0, 0, 0) - 1000.0 * 0.75f64.exp()).abs() < 1e-6);

        let double = VerticalFormula::bind(
            FormulaKind::OceanDoubleSigma,
            &ds,
            &FormulaTerms::parse("sigma: s_rho depth: h z1: z1 z2: z2 a: alpha href: href k_c: kc")
                .unwrap(),
        )
        .unwrap();
        // depth == href at (0, 0): f = 0.5 * (z1 + z2)
        let f = -30.0;
        assert!((double.evaluate(0, 0, 0, 0) - (-0.75 * f)).abs() < EPS);
        let upper = f + (-0.25 - 1.0) * (100.0 - f);
        assert!((double.evaluate(0, 1, 0, 0) - upper).abs() < EPS);
    }

    fn levels(name: &str, values: Vec<f64>) -> Variable {
        let shape = [values.len()];
        Variable::new(name, dims(&["lev"]), ArrayD::from_shape_vec(IxDyn(&shape), values).unwrap())
            .unwrap()
    }

    /// Two levels over one row of two columns, two time steps.
    fn atmosphere() -> Dataset {
        Dataset::new()
            .with_coord(Variable::coordinate("lev", vec![0.0, 1.0]))
            .unwrap()
            .with_data_var(levels("sig", vec![0.2, 0.8]))
            .unwrap()
            .with_data_var(Variable::scalar("ptop", 10.0))
            .unwrap()
            .with_data_var(grid("PS", &["time", "lat", "lon"], &[2, 1, 2], |ix| {
                1000.0 + 10.0 * ix[0] as f64 + ix[2] as f64
            }))
            .unwrap()
            .with_data_var(levels("a", vec![0.1, 0.5]))
            .unwrap()
            .with_data_var(levels("b1", vec![0.8, 0.2]))
            .unwrap()
            .with_data_var(levels("b2", vec![0.9, 0.05]))
            .unwrap()
            .with_data_var(Variable::scalar("ztop", 20000.0))
            .unwrap()
            .with_data_var(grid("orog", &["lat", "lon"], &[1, 2], |ix| 200.0 + 50.0 * ix[1] as f64))
            .unwrap()
            .with_data_var(grid("zs1", &["lat", "lon"], &[1, 2], |ix| 1000.0 + 100.0 * ix[1] as f64))
            .unwrap()
            .with_data_var(grid("zs2", &["lat", "lon"], &[1, 2], |ix| 50.0 * ix[1] as f64))
            .unwrap()
    }

    #[test]
    fn test_atmosphere_sigma() {
        let ds = atmosphere();
        let terms = FormulaTerms::parse("sigma: sig ps: PS ptop: ptop").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::AtmosphereSigma, &ds, &terms).unwrap();

        // ps(1, 0, 1) = 1011
        assert!((formula.evaluate(1, 1, 0, 1) - (10.0 + 0.8 * 1001.0)).abs() < EPS);
        assert!((formula.evaluate(0, 0, 0, 0) - (10.0 + 0.2 * 990.0)).abs() < EPS);
    }

    #[test]
    fn test_hybrid_height() {
        let ds = atmosphere();
        let terms = FormulaTerms::parse("a: a b: b1 orog: orog").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::AtmosphereHybridHeight, &ds, &terms).unwrap();

        // orog has no time axis, so n is ignored
        assert!((formula.evaluate(1, 1, 0, 1) - (0.5 + 0.2 * 250.0)).abs() < EPS);
        assert!((formula.evaluate(0, 0, 0, 0) - (0.1 + 0.8 * 200.0)).abs() < EPS);
    }

    #[test]
    fn test_sleve_surface_terms_decay_with_height() {
        let ds = atmosphere();
        let terms =
            FormulaTerms::parse("a: a b1: b1 b2: b2 ztop: ztop zsurf1: zs1 zsurf2: zs2").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::AtmosphereSleve, &ds, &terms).unwrap();

        let low = 0.1 * 20000.0 + 0.8 * 1100.0 + 0.9 * 50.0;
        let high = 0.5 * 20000.0 + 0.2 * 1100.0 + 0.05 * 50.0;
        assert!((formula.evaluate(0, 0, 0, 1) - low).abs() < EPS);
        assert!((formula.evaluate(0, 1, 0, 1) - high).abs() < EPS);

        // Terrain difference between the two columns shrinks aloft.
        let relief = |k| formula.evaluate(0, k, 0, 1) - formula.evaluate(0, k, 0, 0);
        assert!((relief(0) - (0.8 * 100.0 + 0.9 * 50.0)).abs() < EPS);
        assert!((relief(1) - (0.2 * 100.0 + 0.05 * 50.0)).abs() < EPS);
    }

    #[test]
    fn test_ocean_sigma() {
        let ds = ocean();
        let terms = FormulaTerms::parse("sigma: s_rho eta: zeta depth: h").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSigma, &ds, &terms).unwrap();

        let (eta, depth) = (0.12, 112.0);
        assert!((formula.evaluate(1, 0, 1, 2) - (eta - 0.75 * (depth + eta))).abs() < EPS);
        assert!((formula.evaluate(0, 1, 0, 0) - (-0.25 * 100.0)).abs() < EPS);
    }

    #[test]
    fn test_ocean_s_stretching() {
        let ds = ocean()
            .with_coord(Variable::coordinate("s_w", vec![-1.0, -0.5, 0.0]))
            .unwrap()
            .with_data_var(Variable::scalar("theta_s", 5.0))
            .unwrap()
            .with_data_var(Variable::scalar("theta_b", 0.4))
            .unwrap();
        let terms =
            FormulaTerms::parse("s: s_w eta: zeta depth: h a: theta_s b: theta_b depth_c: hc")
                .unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanS, &ds, &terms).unwrap();

        // C(-1) = -1 and C(0) = 0: bottom at -depth, top at the free surface.
        let (eta, depth) = (0.12, 112.0);
        assert!((formula.evaluate(1, 0, 1, 2) - -depth).abs() < EPS);
        assert!((formula.evaluate(1, 2, 1, 2) - eta).abs() < EPS);

        let (a, b, s): (f64, f64, f64) = (5.0, 0.4, -0.5);
        let c = (1.0 - b) * (a * s).sinh() / a.sinh()
            + b * ((a * (s + 0.5)).tanh() / (2.0 * (0.5 * a).tanh()) - 0.5);
        let expected = eta * (1.0 + s) + 20.0 * s + (depth - 20.0) * c;
        assert!((formula.evaluate(1, 1, 1, 2) - expected).abs() < EPS);
        // Surface-intensified: the mid level sits above the unstretched half depth.
        assert!(formula.evaluate(0, 1, 0, 0) > -50.0);
    }

    #[test]
    fn test_lookup_with_bias_and_scale() {
        let ds = ocean()
            .with_coord(
                Variable::coordinate("depth_level", vec![0.0, 1.0])
                    .with_attr("standard_name", "ocean_sigma_z_coordinate")
                    .with_attr("formula_terms", "zlev: zlev"),
            )
            .unwrap();

        let formula = ParametricFormula::lookup(&ds, "depth_level", 10.0, 2.0)
            .unwrap()
            .unwrap();
        assert_eq!(formula.kind(), FormulaKind::OceanSigmaZ);
        assert_eq!(formula.evaluate(0, 0, 0, 0), 10.0 + 2.0 * -5.0);

        assert!(ParametricFormula::lookup(&ds, "s_rho", 0.0, 1.0).unwrap().is_none());
        assert!(matches!(
            ParametricFormula::lookup(&ds, "nope", 0.0, 1.0),
            Err(MeshError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_binding_errors() {
        let ds = ocean();
        let missing_term = FormulaTerms::parse("s: s_rho eta: zeta depth: h depth_c: hc").unwrap();
        let err = VerticalFormula::bind(FormulaKind::OceanSGenericForm2, &ds, &missing_term).unwrap_err();
        assert!(err.to_string().contains("'C'"));

        let missing_var = FormulaTerms::parse("s: s_rho C: nope eta: zeta depth: h depth_c: hc").unwrap();
        let err = VerticalFormula::bind(FormulaKind::OceanSGenericForm2, &ds, &missing_var).unwrap_err();
        assert!(matches!(err, MeshError::MissingVariable(ref name) if name == "nope"));

        let not_scalar = FormulaTerms::parse("s: s_rho C: Cs_r eta: zeta depth: h depth_c: h").unwrap();
        assert!(VerticalFormula::bind(FormulaKind::OceanSGenericForm2, &ds, &not_scalar).is_err());
    }

    #[test]
    fn test_check_extent() {
        let ds = ocean();
        let terms = FormulaTerms::parse("s: s_rho C: Cs_r eta: zeta depth: h depth_c: hc").unwrap();
        let formula = VerticalFormula::bind(FormulaKind::OceanSGenericForm2, &ds, &terms).unwrap();

        let ok = FormulaExtent { n: 2, k: 2, j: 2, i: 3 };
        assert!(formula.check_extent(&ok).is_ok());

        let past_time = FormulaExtent { n: 3, ..ok };
        assert!(formula.check_extent(&past_time).is_err());
    }
}
