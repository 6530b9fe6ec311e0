//! Packing raw speech output into WAV files.
//!
//! The speech model returns headerless 16-bit little-endian PCM. Downloads
//! are offered as `.wav`, so the samples get a canonical 44-byte RIFF header.

/// Sample rate of speech model output.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;
pub const SPEECH_CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

const WAV_HEADER_LEN: usize = 44;

/// Wrap 16-bit PCM samples in a RIFF/WAVE container.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Parse the sample rate out of a MIME type such as
/// `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
}

/// Duration of a PCM buffer in seconds.
pub fn pcm_duration_secs(pcm_len: usize, sample_rate: u32, channels: u16) -> f64 {
    let bytes_per_sec = f64::from(sample_rate) * f64::from(channels) * f64::from(BITS_PER_SAMPLE / 8);
    if bytes_per_sec == 0.0 {
        return 0.0;
    }
    pcm_len as f64 / bytes_per_sec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let pcm = vec![0u8; 480];
        let wav = pcm_to_wav(&pcm, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS);

        assert_eq!(wav.len(), 44 + 480);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 480);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 480);
    }

    #[test]
    fn rate_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(sample_rate_from_mime("audio/wav"), None);
    }

    #[test]
    fn duration() {
        assert!((pcm_duration_secs(48_000, 24_000, 1) - 1.0).abs() < 1e-9);
    }
}
