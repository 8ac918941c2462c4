use common::math::LogProbability;
use rand::Rng;
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Clone)]
struct Particle<T> {
    weight: f64,
    value: T,
}

/// A population of weighted hypotheses.
///
/// Weights are kept normalized: every call to [`ParticleFilter::update`] multiplies each weight
/// by the likelihood returned for its particle and then rescales them so that they sum to one.
/// The computation is done in log space so that long scans with tiny likelihoods do not
/// underflow.
pub struct ParticleFilter<T> {
    particles: Vec<Particle<T>>,
    max_particle: usize,
}

impl<T: Clone + Send> ParticleFilter<T> {
    pub fn new(number_of_particles: usize, initial_value: T) -> Self {
        Self::from_fn(number_of_particles, |_| initial_value.clone())
    }

    /// Creates `number_of_particles` particles, the i:th one being `f(i)`.
    pub fn from_fn(number_of_particles: usize, f: impl FnMut(usize) -> T) -> Self {
        assert!(number_of_particles > 0, "Must have at least one particle");

        let weight = 1.0 / number_of_particles as f64;
        Self {
            particles: (0..number_of_particles)
                .map(f)
                .map(|value| Particle { weight, value })
                .collect(),
            max_particle: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Allows performing any updates to the value of each Particle. The returned likelihood is
    /// folded into the weight of the particle and the weights are normalized afterwards.
    ///
    /// Particles are independent of each other, with the `parallel` feature they are updated on
    /// the rayon thread pool.
    pub fn update(&mut self, f: impl Fn(&mut T) -> LogProbability + Send + Sync) {
        #[cfg(feature = "parallel")]
        let log_weights: Vec<f64> = self
            .particles
            .par_iter_mut()
            .map(|p| p.weight.ln() + f(&mut p.value).ln())
            .collect();

        #[cfg(not(feature = "parallel"))]
        let log_weights: Vec<f64> = self
            .particles
            .iter_mut()
            .map(|p| p.weight.ln() + f(&mut p.value).ln())
            .collect();

        self.normalize_weights(&log_weights);
    }

    fn normalize_weights(&mut self, log_weights: &[f64]) {
        let max = log_weights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        if !max.is_finite() {
            // every hypothesis got zero (or undefined) support, no information to keep
            warn!("All particle weights vanished, falling back to uniform weights");
            self.reset_weights();
            return;
        }

        let scaled: Vec<f64> = log_weights.iter().map(|w| (w - max).exp()).collect();
        let sum: f64 = scaled.iter().sum();

        for (p, w) in self.particles.iter_mut().zip(scaled) {
            p.weight = w / sum;
        }

        // store the particle with the maximum weight
        self.max_particle = self
            .particles
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
            .map(|(index, _)| index)
            .unwrap_or(0);
    }

    fn reset_weights(&mut self) {
        let weight = 1.0 / self.particles.len() as f64;
        for p in &mut self.particles {
            p.weight = weight;
        }
    }

    /// Computes the number of effective particles, a measure of how well the population
    /// represents the posterior. Ranges from 1 (all weight on one particle) to N (uniform).
    pub fn number_of_effective_particles(&self) -> f64 {
        1.0 / self
            .particles
            .iter()
            .map(|p| p.weight * p.weight)
            .sum::<f64>()
    }

    pub fn weight(&self, index: usize) -> f64 {
        self.particles[index].weight
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.particles.iter().map(|p| p.weight)
    }

    pub fn particle_value(&self, index: usize) -> &T {
        &self.particles[index].value
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.particles.iter().map(|p| &p.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.particles.iter_mut().map(|p| &mut p.value)
    }

    pub fn strongest_particle_idx(&self) -> usize {
        self.max_particle
    }

    /// Resamples only if the number of effective particles dropped below
    /// `neff_ratio * number_of_particles`. Returns the parent index of every new particle if a
    /// resample took place.
    pub fn try_resample(&mut self, neff_ratio: f64, rng: &mut impl Rng) -> Option<Vec<usize>> {
        let threshold = neff_ratio * self.particles.len() as f64;
        if self.number_of_effective_particles() < threshold {
            Some(self.resample(rng))
        } else {
            None
        }
    }

    /// Low variance (systematic) resampling. Each new particle is a clone of its parent and all
    /// weights are reset to `1/N`. Returns the parent index of every new particle, parents are
    /// visited in order so the children of one parent are contiguous.
    pub fn resample(&mut self, rng: &mut impl Rng) -> Vec<usize> {
        let num_particles = self.particles.len();
        let step = 1.0 / num_particles as f64;

        // Assumes weights are normalized, which they are since the only way to modify them is through the call to `update`
        let r: f64 = rng.gen::<f64>() * step;
        let mut c = self.particles[0].weight;
        let mut i = 0;

        let mut parents = Vec::with_capacity(num_particles);
        for m in 0..num_particles {
            let u = r + m as f64 * step;

            // the bound guards against the cumulative sum falling short of 1 by rounding
            while u > c && i + 1 < num_particles {
                i += 1;
                c += self.particles[i].weight;
            }
            parents.push(i);
        }

        // the heaviest particle has a weight of at least 1/N and always survives
        let strongest = self.max_particle;

        // add the parents to the new generation (note that this a copying operation)
        self.particles = parents
            .iter()
            .map(|&p| Particle {
                weight: step,
                value: self.particles[p].value.clone(),
            })
            .collect();

        self.max_particle = parents.iter().position(|&p| p == strongest).unwrap_or(0);

        parents
    }
}
