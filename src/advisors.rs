// ==============================================================================
// advisors.rs - Pharmacogenomic, Nutrition, Exercise and Trait Advisors
// ==============================================================================
// Description: Table-driven (rsID, genotype) → recommendation and trait lookups
// Author: Matt Barham
// Created: 2026-01-22
// Modified: 2026-10-19
// Version: 1.1.0
// ==============================================================================
// A genotype without a matching rule yields no recommendation or trait. There
// is no fallback guess. A repeated rsID is advised from its first call only.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::genotype::Genotype;
use crate::models::{first_by_rsid, EvidenceLevel, Priority, ProcessedVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorDomain {
    Pharmacogenomic,
    Nutrition,
    Exercise,
}

/// Recommendation emitted for one matching variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub domain: AdvisorDomain,
    pub gene: String,
    pub rsid: String,
    pub genotype: Genotype,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub evidence_level: EvidenceLevel,
    /// Affected drug (pharmacogenomic rules only)
    pub drug: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
}

/// One row of an advisor table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRule {
    pub gene: String,
    pub rsid: String,
    pub genotype: Genotype,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub evidence_level: EvidenceLevel,
    #[serde(default)]
    pub drug: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
}

impl AdvisorRule {
    fn new(
        gene: &str,
        rsid: &str,
        alleles: (char, char),
        title: &str,
        description: &str,
        priority: Priority,
        evidence_level: EvidenceLevel,
    ) -> Self {
        Self {
            gene: gene.to_string(),
            rsid: rsid.to_string(),
            genotype: Genotype::from_alleles(alleles.0, alleles.1),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            evidence_level,
            drug: None,
            dosage: None,
            frequency: None,
        }
    }

    fn drug(mut self, drug: &str) -> Self {
        self.drug = Some(drug.to_string());
        self
    }

    fn dosage(mut self, dosage: &str) -> Self {
        self.dosage = Some(dosage.to_string());
        self
    }

    fn frequency(mut self, frequency: &str) -> Self {
        self.frequency = Some(frequency.to_string());
        self
    }
}

/// Lookup table for a single domain
#[derive(Debug, Clone)]
pub struct Advisor {
    domain: AdvisorDomain,
    rules: Vec<AdvisorRule>,
    index: HashMap<(String, Genotype), Vec<usize>>,
}

impl Advisor {
    pub fn new(domain: AdvisorDomain, rules: Vec<AdvisorRule>) -> Self {
        let mut index: HashMap<(String, Genotype), Vec<usize>> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            index
                .entry((rule.rsid.clone(), rule.genotype))
                .or_default()
                .push(i);
        }
        Self {
            domain,
            rules,
            index,
        }
    }

    pub fn domain(&self) -> AdvisorDomain {
        self.domain
    }

    /// Rules matching a call exactly (after allele-order normalization)
    pub fn rules_for<'a>(
        &'a self,
        rsid: &str,
        gene: &'a str,
        genotype: Genotype,
    ) -> impl Iterator<Item = &'a AdvisorRule> + 'a {
        self.index
            .get(&(rsid.to_string(), genotype))
            .into_iter()
            .flatten()
            .map(move |i| &self.rules[*i])
            .filter(move |rule| rule.gene == gene)
    }

    pub fn advise(&self, variants: &[ProcessedVariant]) -> Vec<Recommendation> {
        first_by_rsid(variants)
            .flat_map(|variant| {
                self.rules_for(&variant.rsid, variant.gene(), variant.genotype)
                    .map(|rule| self.recommend(rule))
            })
            .collect()
    }

    fn recommend(&self, rule: &AdvisorRule) -> Recommendation {
        Recommendation {
            domain: self.domain,
            gene: rule.gene.clone(),
            rsid: rule.rsid.clone(),
            genotype: rule.genotype,
            title: rule.title.clone(),
            description: rule.description.clone(),
            priority: rule.priority,
            evidence_level: rule.evidence_level,
            drug: rule.drug.clone(),
            dosage: rule.dosage.clone(),
            frequency: rule.frequency.clone(),
        }
    }
}

/// Visible trait predicted from one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitPrediction {
    /// Trait category (e.g., "Hair color")
    pub category: String,
    pub prediction: String,
    pub gene: String,
    pub rsid: String,
    pub genotype: Genotype,
    pub evidence_level: EvidenceLevel,
}

/// One row of the trait table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitRule {
    pub gene: String,
    pub rsid: String,
    pub genotype: Genotype,
    pub category: String,
    pub prediction: String,
    pub evidence_level: EvidenceLevel,
}

impl TraitRule {
    fn new(
        gene: &str,
        rsid: &str,
        alleles: (char, char),
        category: &str,
        prediction: &str,
        evidence_level: EvidenceLevel,
    ) -> Self {
        Self {
            gene: gene.to_string(),
            rsid: rsid.to_string(),
            genotype: Genotype::from_alleles(alleles.0, alleles.1),
            category: category.to_string(),
            prediction: prediction.to_string(),
            evidence_level,
        }
    }
}

/// (rsID, genotype) → trait lookup
#[derive(Debug, Clone)]
pub struct TraitAdvisor {
    rules: Vec<TraitRule>,
    index: HashMap<(String, Genotype), usize>,
}

impl TraitAdvisor {
    pub fn new(rules: Vec<TraitRule>) -> Self {
        let mut index = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            index.entry((rule.rsid.clone(), rule.genotype)).or_insert(i);
        }
        Self { rules, index }
    }

    pub fn rule_for(&self, rsid: &str, gene: &str, genotype: Genotype) -> Option<&TraitRule> {
        let rule = &self.rules[*self.index.get(&(rsid.to_string(), genotype))?];
        (rule.gene == gene).then_some(rule)
    }

    pub fn predict(&self, variants: &[ProcessedVariant]) -> Vec<TraitPrediction> {
        first_by_rsid(variants)
            .filter_map(|variant| self.rule_for(&variant.rsid, variant.gene(), variant.genotype))
            .map(|rule| TraitPrediction {
                category: rule.category.clone(),
                prediction: rule.prediction.clone(),
                gene: rule.gene.clone(),
                rsid: rule.rsid.clone(),
                genotype: rule.genotype,
                evidence_level: rule.evidence_level,
            })
            .collect()
    }
}

/// Output of all advisors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub pharmacogenomic: Vec<Recommendation>,
    pub nutrition: Vec<Recommendation>,
    pub exercise: Vec<Recommendation>,
    #[serde(default)]
    pub traits: Vec<TraitPrediction>,
}

impl Advice {
    pub fn is_empty(&self) -> bool {
        self.pharmacogenomic.is_empty()
            && self.nutrition.is_empty()
            && self.exercise.is_empty()
            && self.traits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pharmacogenomic.len() + self.nutrition.len() + self.exercise.len() + self.traits.len()
    }
}

/// The domain advisors, each run independently over the same variants
#[derive(Debug, Clone)]
pub struct DomainAdvisors {
    pub pharmacogenomic: Advisor,
    pub nutrition: Advisor,
    pub exercise: Advisor,
    pub traits: TraitAdvisor,
}

impl DomainAdvisors {
    pub fn standard() -> Self {
        Self {
            pharmacogenomic: Advisor::new(AdvisorDomain::Pharmacogenomic, pharmacogenomic_rules()),
            nutrition: Advisor::new(AdvisorDomain::Nutrition, nutrition_rules()),
            exercise: Advisor::new(AdvisorDomain::Exercise, exercise_rules()),
            traits: TraitAdvisor::new(trait_rules()),
        }
    }

    pub fn advise(&self, variants: &[ProcessedVariant]) -> Advice {
        Advice {
            pharmacogenomic: self.pharmacogenomic.advise(variants),
            nutrition: self.nutrition.advise(variants),
            exercise: self.exercise.advise(variants),
            traits: self.traits.predict(variants),
        }
    }

    /// Lifestyle (nutrition or exercise) rules triggered by a call
    pub fn lifestyle_rules_for<'a>(
        &'a self,
        variant: &'a ProcessedVariant,
    ) -> impl Iterator<Item = &'a AdvisorRule> + 'a {
        self.nutrition
            .rules_for(&variant.rsid, variant.gene(), variant.genotype)
            .chain(self.exercise.rules_for(&variant.rsid, variant.gene(), variant.genotype))
    }
}

fn pharmacogenomic_rules() -> Vec<AdvisorRule> {
    use EvidenceLevel::*;
    use Priority::*;

    vec![
        AdvisorRule::new("CYP2C9", "rs1799853", ('C', 'T'), "Warfarin: intermediate metabolizer",
            "CYP2C9*2 carrier. Reduced warfarin clearance; monitor INR closely during initiation.", Medium, A)
            .drug("Warfarin").dosage("Consider 10-20% lower initial dose"),
        AdvisorRule::new("CYP2C9", "rs1799853", ('T', 'T'), "Warfarin: poor metabolizer",
            "CYP2C9*2/*2. Markedly reduced warfarin clearance and bleeding risk at standard doses.", High, A)
            .drug("Warfarin").dosage("Reduce dose by 25-50%"),
        AdvisorRule::new("CYP2C9", "rs1057910", ('A', 'C'), "Warfarin: intermediate metabolizer",
            "CYP2C9*3 carrier. Monitor INR closely.", Medium, A)
            .drug("Warfarin").dosage("Consider 20-30% lower initial dose"),
        AdvisorRule::new("CYP2C9", "rs1057910", ('C', 'C'), "Warfarin: poor metabolizer",
            "CYP2C9*3/*3. Very low warfarin clearance.", High, A)
            .drug("Warfarin").dosage("Reduce dose by 50-80%"),
        AdvisorRule::new("CYP2C19", "rs4244285", ('A', 'G'), "Clopidogrel: intermediate metabolizer",
            "CYP2C19*2 carrier. Reduced activation of clopidogrel.", Medium, A)
            .drug("Clopidogrel"),
        AdvisorRule::new("CYP2C19", "rs4244285", ('A', 'A'), "Clopidogrel: poor metabolizer",
            "CYP2C19*2/*2. Use an alternative antiplatelet therapy.", High, A)
            .drug("Clopidogrel"),
        AdvisorRule::new("CYP2C19", "rs4986893", ('A', 'G'), "Clopidogrel: intermediate metabolizer",
            "CYP2C19*3 carrier. Consider alternative antiplatelet therapy.", Medium, B)
            .drug("Clopidogrel"),
        AdvisorRule::new("CYP2C19", "rs4986893", ('A', 'A'), "Clopidogrel: poor metabolizer",
            "CYP2C19*3/*3. Use an alternative antiplatelet therapy.", High, B)
            .drug("Clopidogrel"),
        AdvisorRule::new("SLCO1B1", "rs4149056", ('C', 'T'), "Simvastatin: increased myopathy risk",
            "SLCO1B1*5 carrier. Prescribe a lower dose or an alternative statin.", Medium, A)
            .drug("Simvastatin").dosage("Max 20 mg/day"),
        AdvisorRule::new("SLCO1B1", "rs4149056", ('C', 'C'), "Simvastatin: high myopathy risk",
            "SLCO1B1*5/*5. Avoid simvastatin; choose an alternative statin.", High, A)
            .drug("Simvastatin"),
        AdvisorRule::new("MTHFR", "rs1801133", ('G', 'G'), "Methotrexate: increased toxicity risk",
            "Reduced MTHFR activity. Monitor for toxicity and consider folic acid supplementation.", Medium, B)
            .drug("Methotrexate"),
    ]
}

fn nutrition_rules() -> Vec<AdvisorRule> {
    use EvidenceLevel::*;
    use Priority::*;

    vec![
        AdvisorRule::new("MTHFR", "rs1801133", ('A', 'G'), "Folate",
            "Mildly reduced folate metabolism. Prefer folate-rich foods.", Low, A)
            .dosage("400 mcg folate").frequency("daily"),
        AdvisorRule::new("MTHFR", "rs1801133", ('G', 'G'), "Folate",
            "High dose folate supplementation recommended, preferably methylfolate.", High, A)
            .dosage("800 mcg methylfolate").frequency("daily"),
        AdvisorRule::new("MTHFR", "rs1801133", ('G', 'G'), "Vitamin B12",
            "B12 levels should be monitored.", Medium, B)
            .frequency("yearly blood test"),
        AdvisorRule::new("APOE", "rs429358", ('C', 'T'), "Dietary fat",
            "APOE4 carrier. Low saturated fat diet recommended.", Medium, B),
        AdvisorRule::new("APOE", "rs429358", ('C', 'C'), "Dietary fat",
            "APOE4 homozygote. Strict limit on saturated fat; favor a Mediterranean pattern.", High, B),
        AdvisorRule::new("MCM6", "rs4988235", ('G', 'G'), "Lactose",
            "Lactase non-persistence likely. Limit dairy or use lactase supplements.", Medium, A),
        AdvisorRule::new("FADS1", "rs174537", ('T', 'T'), "Omega-3",
            "Lower conversion of plant omega-3. Include direct EPA/DHA sources.", Low, B)
            .dosage("250-500 mg EPA+DHA").frequency("daily"),
        AdvisorRule::new("FUT2", "rs601338", ('A', 'A'), "Vitamin B12",
            "Non-secretor status. Lower B12 absorption; monitor B12.", Medium, B),
        AdvisorRule::new("CYP1A2", "rs762551", ('A', 'C'), "Caffeine",
            "Slow caffeine metabolizer. Limit caffeine intake.", Low, B)
            .dosage("Max 200 mg caffeine").frequency("daily"),
        AdvisorRule::new("CYP1A2", "rs762551", ('C', 'C'), "Caffeine",
            "Slow caffeine metabolizer. Limit caffeine intake.", Medium, B)
            .dosage("Max 200 mg caffeine").frequency("daily"),
        AdvisorRule::new("FTO", "rs9939609", ('A', 'A'), "Calorie balance",
            "Higher obesity predisposition. Calorie-controlled, high protein diet.", Medium, B),
    ]
}

fn exercise_rules() -> Vec<AdvisorRule> {
    use EvidenceLevel::*;
    use Priority::*;

    vec![
        AdvisorRule::new("ACTN3", "rs1815739", ('C', 'C'), "Power training",
            "Functional alpha-actinin-3. Well suited to power and sprint training.", Low, B)
            .frequency("2-3 sessions/week"),
        AdvisorRule::new("ACTN3", "rs1815739", ('C', 'T'), "Mixed training",
            "Balanced power and endurance profile.", Low, B)
            .frequency("3-4 sessions/week"),
        AdvisorRule::new("ACTN3", "rs1815739", ('T', 'T'), "Endurance training",
            "Alpha-actinin-3 deficient. Endurance training favored.", Low, B)
            .frequency("3-5 sessions/week"),
        AdvisorRule::new("PPARGC1A", "rs8192678", ('A', 'A'), "Aerobic conditioning",
            "Lower aerobic trainability. Progress aerobic volume gradually.", Low, C)
            .frequency("150 min/week"),
        AdvisorRule::new("FTO", "rs9939609", ('A', 'A'), "Regular activity",
            "Physical activity attenuates the FTO obesity effect.", Medium, B)
            .frequency("150-300 min/week"),
    ]
}

fn trait_rules() -> Vec<TraitRule> {
    use EvidenceLevel::*;

    vec![
        // MC1R R151C (C>T)
        TraitRule::new("MC1R", "rs1805007", ('C', 'T'), "Hair color",
            "Red hair carrier; red or auburn tints possible", B),
        TraitRule::new("MC1R", "rs1805007", ('T', 'T'), "Hair color",
            "Red hair predisposition", B),
        // SLC45A2 L374F; G is the light-pigmentation allele
        TraitRule::new("SLC45A2", "rs16891982", ('C', 'G'), "Skin color",
            "Intermediate skin tone", C),
        TraitRule::new("SLC45A2", "rs16891982", ('G', 'G'), "Skin color",
            "Lighter skin tone", C),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::KnowledgeBase;

    fn variant(kb: &KnowledgeBase, rsid: &str, genotype: &str) -> ProcessedVariant {
        ProcessedVariant {
            rsid: rsid.to_string(),
            chromosome: "1".to_string(),
            position: 1,
            genotype: Genotype::parse(genotype).unwrap(),
            quality: 0.95,
            coverage: 30,
            annotation: kb.lookup(rsid).unwrap().clone(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_every_rule_gene_is_in_knowledge_base() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advisors = DomainAdvisors::standard();
        for advisor in [&advisors.pharmacogenomic, &advisors.nutrition, &advisors.exercise] {
            for rule in &advisor.rules {
                let entry = kb.lookup(&rule.rsid).expect("rule rsid missing from knowledge base");
                assert_eq!(entry.gene, rule.gene);
            }
        }
        for rule in &advisors.traits.rules {
            let entry = kb.lookup(&rule.rsid).expect("trait rsid missing from knowledge base");
            assert_eq!(entry.gene, rule.gene);
        }
    }

    #[test]
    fn test_warfarin_poor_metabolizer() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advice = DomainAdvisors::standard().advise(&[variant(&kb, "rs1799853", "TT")]);

        assert_eq!(advice.pharmacogenomic.len(), 1);
        let rec = &advice.pharmacogenomic[0];
        assert_eq!(rec.drug.as_deref(), Some("Warfarin"));
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(rec.dosage.as_deref(), Some("Reduce dose by 25-50%"));
        assert!(advice.nutrition.is_empty());
    }

    #[test]
    fn test_allele_order_does_not_matter() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advisors = DomainAdvisors::standard();

        let a = advisors.advise(&[variant(&kb, "rs1815739", "TC")]);
        let b = advisors.advise(&[variant(&kb, "rs1815739", "CT")]);
        assert_eq!(a, b);
        assert_eq!(a.exercise[0].title, "Mixed training");
    }

    #[test]
    fn test_no_rule_means_no_recommendation() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advisors = DomainAdvisors::standard();

        // Reference genotype and an unrelated variant
        let advice = advisors.advise(&[
            variant(&kb, "rs1799853", "CC"),
            variant(&kb, "rs334", "TT"),
        ]);
        assert!(advice.is_empty());
    }

    #[test]
    fn test_one_variant_feeds_several_domains() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advice = DomainAdvisors::standard().advise(&[
            variant(&kb, "rs1801133", "GG"),
            variant(&kb, "rs9939609", "AA"),
        ]);

        assert_eq!(advice.pharmacogenomic.len(), 1);
        assert_eq!(advice.nutrition.len(), 3);
        assert_eq!(advice.exercise.len(), 1);
        assert_eq!(advice.len(), 5);
        assert!(advice
            .nutrition
            .iter()
            .all(|r| r.domain == AdvisorDomain::Nutrition));
    }

    #[test]
    fn test_repeated_rsid_advised_from_first_call() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advice = DomainAdvisors::standard().advise(&[
            variant(&kb, "rs1801133", "AG"),
            variant(&kb, "rs1801133", "GG"),
        ]);

        // Only the heterozygous folate rule; no GG folate, B12 or methotrexate
        assert_eq!(advice.nutrition.len(), 1);
        assert_eq!(advice.nutrition[0].genotype.to_string(), "AG");
        assert!(advice.pharmacogenomic.is_empty());
    }

    #[test]
    fn test_red_hair_predisposition() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advice = DomainAdvisors::standard().advise(&[
            variant(&kb, "rs1805007", "TT"),
            variant(&kb, "rs16891982", "GG"),
        ]);

        assert_eq!(advice.traits.len(), 2);
        let hair = &advice.traits[0];
        assert_eq!(hair.gene, "MC1R");
        assert_eq!(hair.category, "Hair color");
        assert_eq!(hair.prediction, "Red hair predisposition");
        assert_eq!(advice.traits[1].prediction, "Lighter skin tone");
        assert_eq!(advice.len(), 2);
    }

    #[test]
    fn test_reference_trait_call_predicts_nothing() {
        let kb = KnowledgeBase::builtin().unwrap();
        let advice = DomainAdvisors::standard().advise(&[
            variant(&kb, "rs1805007", "CC"),
            variant(&kb, "rs16891982", "CC"),
        ]);

        assert!(advice.traits.is_empty());
        assert!(advice.is_empty());
    }
}
