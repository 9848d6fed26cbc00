use std::collections::HashMap;

use glow::HasContext;
use postfx_core::{Address, ChainError, Filter};

use crate::formats::{gl_address, gl_mag_filter, gl_min_filter};

type SamplerKey = (Filter, Filter, Address);

/// One sampler object per distinct sampling state, created on first use.
#[derive(Debug, Default)]
pub struct SamplerCache {
    samplers: HashMap<SamplerKey, glow::NativeSampler>,
}

impl SamplerCache {
    pub unsafe fn get(
        &mut self,
        gl: &glow::Context,
        filter: Filter,
        mip_filter: Filter,
        address: Address,
    ) -> Result<glow::NativeSampler, ChainError> {
        let key = (filter, mip_filter, address);
        if let Some(sampler) = self.samplers.get(&key) {
            return Ok(*sampler);
        }

        let sampler = gl
            .create_sampler()
            .map_err(|e| ChainError::resource(format!("create_sampler failed: {e}")))?;
        let wrap = gl_address(address) as i32;
        gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_S, wrap);
        gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_T, wrap);
        gl.sampler_parameter_i32(sampler, glow::TEXTURE_MAG_FILTER, gl_mag_filter(filter) as i32);
        gl.sampler_parameter_i32(
            sampler,
            glow::TEXTURE_MIN_FILTER,
            gl_min_filter(filter, mip_filter) as i32,
        );
        self.samplers.insert(key, sampler);
        Ok(sampler)
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        for (_, sampler) in self.samplers.drain() {
            gl.delete_sampler(sampler);
        }
    }
}
