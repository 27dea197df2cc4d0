use data_contracts::recording::{RecordingHeader, SeizureInterval, ValidationError};

fn header(seizures: Vec<SeizureInterval>) -> RecordingHeader {
    RecordingHeader {
        patient_id: "chb01".into(),
        sampling_rate: 256,
        channels: vec!["FP1-F7".into(), "F7-T7".into()],
        samples: 256 * 60,
        signal_file: "chb01_01.f32".into(),
        dtype: Default::default(),
        endianness: Default::default(),
        seizures,
    }
}

#[test]
fn valid_header_passes() {
    let h = header(vec![SeizureInterval {
        start_s: 10.0,
        end_s: 20.0,
    }]);
    assert!(h.validate().is_ok());
    assert!(h.is_ictal_at(15.0));
    assert!(!h.is_ictal_at(25.0));
}

#[test]
fn reversed_seizure_rejected() {
    let h = header(vec![SeizureInterval {
        start_s: 20.0,
        end_s: 10.0,
    }]);
    let err = h.validate().unwrap_err();
    assert!(matches!(err, ValidationError::InvalidSeizure { index: 0, .. }));
}

#[test]
fn seizure_past_end_rejected() {
    let h = header(vec![SeizureInterval {
        start_s: 50.0,
        end_s: 61.0,
    }]);
    let err = h.validate().unwrap_err();
    assert!(matches!(err, ValidationError::SeizurePastEnd { .. }));
}

#[test]
fn empty_channels_rejected() {
    let mut h = header(Vec::new());
    h.channels.clear();
    assert!(matches!(h.validate(), Err(ValidationError::NoChannels)));
}

#[test]
fn zero_sampling_rate_rejected() {
    let mut h = header(Vec::new());
    h.sampling_rate = 0;
    assert!(matches!(h.validate(), Err(ValidationError::ZeroSamplingRate)));
}

#[test]
fn nan_seizure_bounds_rejected() {
    for (start_s, end_s) in [(f64::NAN, 10.0), (5.0, f64::NAN)] {
        let h = header(vec![SeizureInterval { start_s, end_s }]);
        assert!(matches!(
            h.validate(),
            Err(ValidationError::InvalidSeizure { index: 0, .. })
        ));
    }
}

#[test]
fn negative_seizure_start_rejected() {
    let h = header(vec![
        SeizureInterval {
            start_s: 1.0,
            end_s: 2.0,
        },
        SeizureInterval {
            start_s: -1.0,
            end_s: 3.0,
        },
    ]);
    assert!(matches!(
        h.validate(),
        Err(ValidationError::InvalidSeizure { index: 1, .. })
    ));
}

#[test]
fn blank_signal_file_rejected() {
    let mut h = header(Vec::new());
    h.signal_file = "   ".into();
    assert!(matches!(h.validate(), Err(ValidationError::MissingSignalFile)));
}
